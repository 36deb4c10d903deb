//! Publish sinks for `liveNaviData` snapshots.
//!
//! Delivery is best-effort: the service logs a failed publish and moves on to the next
//! record. Nothing here retries.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;

use navi_core::{LiveNaviData, NaviError, NaviResult};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A destination for snapshots.
pub trait Publisher: Send {
    /// Short sink name for diagnostics.
    fn name(&self) -> &str;

    /// Deliver one snapshot.
    fn publish(&mut self, message: &LiveNaviData) -> NaviResult<()>;

    /// Flush buffered output. Default: nothing buffered.
    fn flush(&mut self) -> NaviResult<()> {
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesPublisher<W: Write + Send> {
    name: String,
    writer: W,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    /// Wrap `writer`.
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
        }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesPublisher<std::io::Stdout> {
    /// Line-per-message publisher on stdout.
    pub fn stdout() -> Self {
        Self::new("stdout", std::io::stdout())
    }
}

impl JsonLinesPublisher<BufWriter<std::fs::File>> {
    /// Append to `path`, creating it if missing.
    pub fn append_to(path: &Path) -> NaviResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "Publishing to file");
        Ok(Self::new(path.display().to_string(), BufWriter::new(file)))
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&mut self, message: &LiveNaviData) -> NaviResult<()> {
        let line = message.to_json_line()?;
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn flush(&mut self) -> NaviResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Sends each snapshot as one JSON datagram, fire-and-forget.
pub struct UdpPublisher {
    socket: UdpSocket,
    target: SocketAddr,
    name: String,
}

impl UdpPublisher {
    /// Bind an ephemeral local port and send to `target`.
    pub fn new(target: SocketAddr) -> NaviResult<Self> {
        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind)?;
        info!(%target, "Publishing over UDP");
        Ok(Self {
            socket,
            target,
            name: format!("udp://{target}"),
        })
    }
}

impl Publisher for UdpPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&mut self, message: &LiveNaviData) -> NaviResult<()> {
        let payload = serde_json::to_vec(message)?;
        self.socket.send_to(&payload, self.target)?;
        Ok(())
    }
}

/// Fans snapshots out to in-process subscribers.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<LiveNaviData>,
}

impl BroadcastPublisher {
    /// Channel holding up to `capacity` unread snapshots per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New subscriber; sees snapshots published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveNaviData> {
        self.tx.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn publish(&mut self, message: &LiveNaviData) -> NaviResult<()> {
        // No subscribers is not a failure.
        if self.tx.send(message.clone()).is_err() {
            debug!("No broadcast subscribers");
        }
        Ok(())
    }
}

/// Resolve `target` into a socket address for [`UdpPublisher`].
pub fn parse_target(target: &str) -> NaviResult<SocketAddr> {
    target
        .parse()
        .map_err(|_| NaviError::Configuration(format!("'{target}' is not a socket address")))
}
