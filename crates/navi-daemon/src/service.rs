//! The relay loop.
//!
//! [`NaviService`] pulls one record at a time from its [`LogSource`], runs a
//! [`NaviEngine`] cycle with the latest speed and a single wall-clock sample, and hands
//! the resulting snapshot to every [`Publisher`]. Exhausted sources are reopened after a
//! fixed backoff; a source that cannot be opened ends the run with an error.

use std::time::Duration;

use anyhow::{Context, Result};
use navi_core::{Clock, FixedFlags, FlagStore, LogRecord, NaviEngine, NaviResult, SystemClock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{FlagKind, Settings, SinkKind, SourceKind, SpeedKind};
use crate::flags::ParamsDirStore;
use crate::publisher::{parse_target, JsonLinesPublisher, Publisher, UdpPublisher};
use crate::shutdown::Shutdown;
use crate::source::{FileSource, LogSource, LogcatSource, ResumePoint, SourceEvent};
use crate::speed::{bind_udp_listener, SpeedFeed};

/// Counters for one service run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Records processed.
    pub records: u64,
    /// Records carrying one of the navigation tags.
    pub navigation_records: u64,
    /// Lines skipped as unparseable.
    pub malformed: u64,
    /// Times the source was reopened.
    pub reconnects: u64,
    /// Successful sink deliveries.
    pub published: u64,
    /// Failed sink deliveries.
    pub publish_errors: u64,
}

/// Navigation relay: source → engine → publishers.
pub struct NaviService {
    source: Box<dyn LogSource>,
    engine: NaviEngine,
    speed: SpeedFeed,
    flags: Box<dyn FlagStore + Send + Sync>,
    publishers: Vec<Box<dyn Publisher>>,
    clock: Box<dyn Clock>,
    reconnect_backoff: Duration,
    shutdown: Shutdown,
    resume: Option<ResumePoint>,
    stats: ServiceStats,
}

impl NaviService {
    /// Service with the system clock, no publishers and a 500 ms reconnect backoff.
    pub fn new(
        source: Box<dyn LogSource>,
        engine: NaviEngine,
        speed: SpeedFeed,
        flags: Box<dyn FlagStore + Send + Sync>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            engine,
            speed,
            flags,
            publishers: Vec::new(),
            clock: Box::new(SystemClock),
            reconnect_backoff: Duration::from_millis(500),
            shutdown,
            resume: None,
            stats: ServiceStats::default(),
        }
    }

    /// Add a publish sink.
    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delay between source exhaustion and reopen.
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Engine state, for inspection.
    pub fn engine(&self) -> &NaviEngine {
        &self.engine
    }

    /// Counters so far.
    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    /// Assemble a service and its helper tasks from settings.
    pub async fn from_settings(
        settings: &Settings,
        shutdown: Shutdown,
    ) -> Result<(Self, Vec<JoinHandle<()>>)> {
        let mut tasks = Vec::new();

        let source: Box<dyn LogSource> = match settings.source.kind {
            SourceKind::Logcat => Box::new(LogcatSource::new(
                settings.source.command.clone(),
                settings.source.args.clone(),
            )),
            SourceKind::File => {
                let path = settings
                    .source
                    .path
                    .clone()
                    .context("source.path is required for the file source")?;
                Box::new(FileSource::file(path))
            }
            SourceKind::Stdin => Box::new(FileSource::stdin()),
        };

        let speed = match settings.speed.kind {
            SpeedKind::Fixed => SpeedFeed::fixed(settings.speed.fixed_mps),
            SpeedKind::Udp => {
                let (tx, feed) = SpeedFeed::channel();
                let task = bind_udp_listener(&settings.speed.udp_bind, tx, shutdown.clone())
                    .await
                    .with_context(|| format!("Failed to bind speed socket {}", settings.speed.udp_bind))?;
                tasks.push(task);
                feed
            }
        };

        let flags: Box<dyn FlagStore + Send + Sync> = match settings.flags.kind {
            FlagKind::Params => Box::new(ParamsDirStore::new(settings.flags.params_dir.clone())),
            FlagKind::Fixed => Box::new(FixedFlags(settings.flags.fixed)),
        };

        let mut service = Self::new(
            source,
            NaviEngine::new(settings.engine),
            speed,
            flags,
            shutdown,
        )
        .with_reconnect_backoff(settings.source.reconnect_backoff());

        for sink in &settings.publish.sinks {
            let publisher: Box<dyn Publisher> = match sink {
                SinkKind::Stdout => Box::new(JsonLinesPublisher::stdout()),
                SinkKind::File => {
                    let path = settings
                        .publish
                        .path
                        .as_deref()
                        .context("publish.path is required for the file sink")?;
                    Box::new(JsonLinesPublisher::append_to(path)?)
                }
                SinkKind::Udp => {
                    let target = settings
                        .publish
                        .udp_target
                        .as_deref()
                        .context("publish.udp_target is required for the udp sink")?;
                    Box::new(UdpPublisher::new(parse_target(target)?)?)
                }
            };
            service = service.with_publisher(publisher);
        }

        Ok((service, tasks))
    }

    /// Run until shutdown or until a non-reopenable source is exhausted.
    ///
    /// Returns an error only when the source cannot be opened.
    pub async fn run(&mut self) -> NaviResult<ServiceStats> {
        self.source.open(None).await?;
        info!(source = %self.source.describe(), sinks = self.publishers.len(), "Navigation relay started");

        while !self.shutdown.is_triggered() {
            let event = tokio::select! {
                _ = self.shutdown.wait() => break,
                event = self.source.next_event() => event,
            };

            match event {
                SourceEvent::Record(record) => {
                    self.resume = Some((record.sec, record.nsec));
                    self.process(&record);
                }
                SourceEvent::Malformed(_) => self.stats.malformed += 1,
                SourceEvent::Exhausted => {
                    self.source.close().await;
                    if !self.source.reopens() {
                        info!(source = %self.source.describe(), "Log source finished");
                        break;
                    }
                    warn!(
                        source = %self.source.describe(),
                        backoff_ms = self.reconnect_backoff.as_millis() as u64,
                        "Log source exhausted, reopening"
                    );
                    tokio::select! {
                        _ = self.shutdown.wait() => break,
                        _ = tokio::time::sleep(self.reconnect_backoff) => {}
                    }
                    self.stats.reconnects += 1;
                    self.source.open(self.resume).await?;
                }
            }
        }

        self.source.close().await;
        for publisher in &mut self.publishers {
            if let Err(e) = publisher.flush() {
                warn!(sink = publisher.name(), error = %e, "Flush failed");
            }
        }
        info!(stats = ?self.stats, "Navigation relay stopped");
        Ok(self.stats)
    }

    /// One cycle: sample speed and clock once, reconcile, publish.
    fn process(&mut self, record: &LogRecord) {
        let speed = self.speed.latest();
        let now = self.clock.now_secs();
        let out = self.engine.cycle(record, speed, now, &*self.flags);

        self.stats.records += 1;
        if out.reconciled.is_navigation() {
            self.stats.navigation_records += 1;
        }

        if self.engine.scheduler().is_active() {
            let event = self.engine.event();
            debug!(
                tag = %record.tag,
                sign = event.sign_code(),
                distance = event.speed_limit_distance,
                speed_limit = event.speed_limit,
                speed,
                arrival_sec = event.arrival_time_sec,
                arrival_distance = event.arrival_distance,
                hide_in = event.hide_timestamp_sec - now,
                phase = ?out.phase,
                "Navigation event active"
            );
        }

        for publisher in &mut self.publishers {
            match publisher.publish(&out.message) {
                Ok(()) => self.stats.published += 1,
                Err(e) => {
                    self.stats.publish_errors += 1;
                    warn!(sink = publisher.name(), error = %e, "Publish failed");
                }
            }
        }
    }
}
