//! Vehicle speed feed.
//!
//! The service reads the latest speed once per cycle without ever waiting for a fresh
//! value. A `watch` channel gives exactly that: the newest value wins, older ones are
//! dropped, and the last value survives the sender going away.

use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::shutdown::Shutdown;

/// Producer half of the speed feed.
pub type SpeedSender = watch::Sender<f32>;

/// Latest known vehicle speed, m/s. Starts at zero.
#[derive(Debug, Clone)]
pub struct SpeedFeed {
    rx: watch::Receiver<f32>,
}

impl SpeedFeed {
    /// Create a connected sender/feed pair.
    pub fn channel() -> (SpeedSender, Self) {
        let (tx, rx) = watch::channel(0.0);
        (tx, Self { rx })
    }

    /// A feed stuck at `speed_mps`.
    pub fn fixed(speed_mps: f32) -> Self {
        let (_tx, rx) = watch::channel(speed_mps);
        Self { rx }
    }

    /// Latest value, non-blocking.
    pub fn latest(&mut self) -> f32 {
        *self.rx.borrow_and_update()
    }
}

#[derive(Deserialize)]
struct SpeedMessage {
    #[serde(alias = "vEgo", alias = "speed")]
    v_ego: f32,
}

/// Parse a speed datagram: a bare number or JSON carrying `vEgo`/`v_ego`/`speed`.
///
/// Non-finite values are rejected.
pub fn parse_speed_datagram(payload: &[u8]) -> Option<f32> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    let speed = match text.parse::<f32>() {
        Ok(speed) => speed,
        Err(_) => serde_json::from_str::<SpeedMessage>(text).ok()?.v_ego,
    };
    speed.is_finite().then_some(speed)
}

/// Bind `addr` and forward every valid speed datagram to `tx` until shutdown.
pub async fn bind_udp_listener(
    addr: &str,
    tx: SpeedSender,
    shutdown: Shutdown,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let socket = UdpSocket::bind(addr).await?;
    info!(addr, "Listening for vehicle speed");
    Ok(tokio::spawn(run_udp_listener(socket, tx, shutdown)))
}

async fn run_udp_listener(socket: UdpSocket, tx: SpeedSender, shutdown: Shutdown) {
    let mut buf = [0u8; 512];
    while !shutdown.is_triggered() {
        let received = tokio::select! {
            _ = shutdown.wait() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        match received {
            Ok((len, peer)) => match parse_speed_datagram(&buf[..len]) {
                Some(speed) => {
                    tx.send_replace(speed);
                }
                None => debug!(%peer, len, "Ignoring malformed speed datagram"),
            },
            Err(e) => warn!(error = %e, "Speed socket receive failed"),
        }
    }
    debug!("Speed listener exiting");
}
