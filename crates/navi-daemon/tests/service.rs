//! Relay loop tests with scripted sources and in-memory sinks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use navi_core::{
    EngineConfig, FixedFlags, LiveNaviData, LogRecord, ManualClock, NaviEngine, NaviError,
    NaviResult, TrafficType,
};
use navi_daemon::source::{parse_epoch_line, ResumePoint};
use navi_daemon::{
    BroadcastPublisher, FileSource, LogSource, NaviService, Publisher, Shutdown, SourceEvent,
    SpeedFeed,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("navi_daemon=debug,navi_core=debug")
        .try_init();
}

/// Source replaying a fixed script per open; advances a shared clock per record.
struct ScriptedSource {
    sessions: VecDeque<Vec<SourceEvent>>,
    current: VecDeque<SourceEvent>,
    opens: Arc<Mutex<Vec<Option<ResumePoint>>>>,
    clock: ManualClock,
    step_secs: f64,
    fail_reopen: bool,
    idle_when_done: bool,
}

impl ScriptedSource {
    fn new(sessions: Vec<Vec<SourceEvent>>, clock: ManualClock) -> Self {
        Self {
            sessions: sessions.into(),
            current: VecDeque::new(),
            opens: Arc::new(Mutex::new(Vec::new())),
            clock,
            step_secs: 0.0,
            fail_reopen: false,
            idle_when_done: false,
        }
    }
}

#[async_trait]
impl LogSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn open(&mut self, resume: Option<ResumePoint>) -> NaviResult<()> {
        let first = self.opens.lock().unwrap().is_empty();
        self.opens.lock().unwrap().push(resume);
        if !first && self.fail_reopen {
            return Err(NaviError::SourceUnavailable {
                source_name: self.describe(),
                message: "gone".into(),
            });
        }
        self.current = self.sessions.pop_front().unwrap_or_default().into();
        Ok(())
    }

    async fn next_event(&mut self) -> SourceEvent {
        match self.current.pop_front() {
            Some(event) => {
                if matches!(event, SourceEvent::Record(_)) {
                    self.clock.advance(self.step_secs);
                }
                event
            }
            None if self.idle_when_done && self.sessions.is_empty() => {
                std::future::pending::<()>().await;
                SourceEvent::Exhausted
            }
            None => SourceEvent::Exhausted,
        }
    }

    async fn close(&mut self) {
        self.current.clear();
    }

    fn reopens(&self) -> bool {
        !self.sessions.is_empty() || self.fail_reopen
    }
}

/// Sink collecting everything it is given.
#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<LiveNaviData>>>);

impl Collect {
    fn messages(&self) -> Vec<LiveNaviData> {
        self.0.lock().unwrap().clone()
    }
}

impl Publisher for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn publish(&mut self, message: &LiveNaviData) -> NaviResult<()> {
        self.0.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Sink that always fails.
struct Broken;

impl Publisher for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn publish(&mut self, _message: &LiveNaviData) -> NaviResult<()> {
        Err(NaviError::Publish("sink closed".into()))
    }
}

fn record(id: u64, sec: i64, tag: &str, message: &str) -> SourceEvent {
    SourceEvent::Record(LogRecord::new(id, sec, 0, tag, message))
}

fn service(source: ScriptedSource, clock: ManualClock, speed: f32) -> (NaviService, Collect) {
    service_with_shutdown(source, clock, speed, Shutdown::new())
}

fn service_with_shutdown(
    source: ScriptedSource,
    clock: ManualClock,
    speed: f32,
    shutdown: Shutdown,
) -> (NaviService, Collect) {
    let sink = Collect::default();
    let service = NaviService::new(
        Box::new(source),
        NaviEngine::new(EngineConfig::default()),
        SpeedFeed::fixed(speed),
        Box::new(FixedFlags(Some(1))),
        shutdown,
    )
    .with_clock(Box::new(clock))
    .with_reconnect_backoff(Duration::from_millis(5))
    .with_publisher(Box::new(sink.clone()));
    (service, sink)
}

#[tokio::test]
async fn publishes_one_message_per_record() {
    init_tracing();
    let clock = ManualClock::new(1_000.0);
    let source = ScriptedSource::new(
        vec![vec![
            record(1, 100, "opkrspdlimit", "60"),
            record(2, 100, "opkrspddist", "500"),
            record(3, 101, "opkrsigntype", "131"),
        ]],
        clock.clone(),
    );
    let (mut service, sink) = service(source, clock, 20.0);

    let stats = service.run().await.unwrap();
    let messages = sink.messages();

    assert_eq!(stats.records, 3);
    assert_eq!(stats.navigation_records, 3);
    assert_eq!(stats.published, 3);
    assert_eq!(messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    let last = &messages[2];
    assert!(last.map_valid);
    assert_eq!(last.ts, 101);
    assert_eq!(last.arrival_sec, 25.0);
    assert_eq!(last.traffic_type, TrafficType::Enforcement);
}

#[tokio::test]
async fn wall_clock_drives_expiry_not_log_time() {
    init_tracing();
    let clock = ManualClock::new(1_000.0);
    let mut source = ScriptedSource::new(
        vec![vec![
            record(1, 100, "opkrspddist", "500"),
            record(2, 100, "opkrsigntype", "131"),
            record(3, 100, "noise", "x"),
        ]],
        clock.clone(),
    );
    // Each record arrives 13 s of wall time after the previous one.
    source.step_secs = 13.0;
    let (mut service, sink) = service(source, clock, 20.0);

    service.run().await.unwrap();
    let messages = sink.messages();
    assert!(messages[1].map_valid);
    assert!(!messages[2].map_valid);
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    init_tracing();
    let clock = ManualClock::new(0.0);
    let source = ScriptedSource::new(
        vec![vec![
            SourceEvent::Malformed("--------- beginning of main".into()),
            record(1, 5, "opkrspdlimit", "50"),
            SourceEvent::Malformed("garbage".into()),
        ]],
        clock.clone(),
    );
    let (mut service, sink) = service(source, clock, 0.0);

    let stats = service.run().await.unwrap();
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.records, 1);
    assert_eq!(sink.messages().len(), 1);
    assert_eq!(sink.messages()[0].speed_limit, 50.0);
}

#[tokio::test]
async fn exhausted_source_reopens_from_last_record() {
    init_tracing();
    let clock = ManualClock::new(0.0);
    let source = ScriptedSource::new(
        vec![
            vec![record(1, 10, "opkrspddist", "300")],
            vec![SourceEvent::Record(LogRecord::new(2, 11, 500, "opkrsigntype", "131"))],
        ],
        clock.clone(),
    );
    let opens = source.opens.clone();
    let (mut service, sink) = service(source, clock, 10.0);

    let stats = service.run().await.unwrap();
    assert_eq!(stats.reconnects, 1);
    assert_eq!(*opens.lock().unwrap(), vec![None, Some((10, 0))]);
    // Event state survives the reconnect.
    let last = sink.messages().pop().unwrap();
    assert_eq!(last.speed_limit_distance, 300.0);
    assert!(last.map_valid);
}

#[tokio::test]
async fn failed_reopen_is_fatal() {
    init_tracing();
    let clock = ManualClock::new(0.0);
    let mut source = ScriptedSource::new(vec![vec![record(1, 10, "opkrspddist", "300")]], clock.clone());
    source.fail_reopen = true;
    let (mut service, _sink) = service(source, clock, 10.0);

    let err = service.run().await.unwrap_err();
    assert!(matches!(err, NaviError::SourceUnavailable { .. }));
    assert_eq!(service.stats().records, 1);
}

#[tokio::test]
async fn publish_failures_do_not_stop_the_loop() {
    init_tracing();
    let clock = ManualClock::new(0.0);
    let source = ScriptedSource::new(
        vec![vec![record(1, 1, "opkrspdlimit", "30"), record(2, 2, "opkrspdlimit", "40")]],
        clock.clone(),
    );
    let (service, sink) = service(source, clock, 0.0);
    let mut service = service.with_publisher(Box::new(Broken));

    let stats = service.run().await.unwrap();
    assert_eq!(stats.publish_errors, 2);
    assert_eq!(stats.published, 2);
    assert_eq!(sink.messages().len(), 2);
}

#[tokio::test]
async fn shutdown_interrupts_a_pending_read() {
    init_tracing();
    let clock = ManualClock::new(0.0);
    let mut source = ScriptedSource::new(vec![vec![record(1, 1, "opkrspdlimit", "30")]], clock.clone());
    source.idle_when_done = true;
    let shutdown = Shutdown::new();
    let (mut service, sink) = service_with_shutdown(source, clock, 0.0, shutdown.clone());
    let handle = tokio::spawn(async move { service.run().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();
    let stats = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(sink.messages().len(), 1);
}

#[tokio::test]
async fn file_source_feeds_broadcast_subscribers() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.log");
    std::fs::write(
        &path,
        "--------- beginning of main\n\
         100.000000  10  11 I opkrspdlimit: 60\n\
         100.200000  10  11 I opkrspddist: 500\n\
         100.400000  10  11 I opkrsigntype: 131\n",
    )
    .unwrap();

    let broadcast = BroadcastPublisher::new(16);
    let mut rx = broadcast.subscribe();
    let clock = ManualClock::new(50.0);
    let shutdown = Shutdown::new();
    let mut service = NaviService::new(
        Box::new(FileSource::file(&path)),
        NaviEngine::default(),
        SpeedFeed::fixed(20.0),
        Box::new(FixedFlags(None)),
        shutdown.clone(),
    )
    .with_clock(Box::new(clock))
    .with_reconnect_backoff(Duration::from_millis(5))
    .with_publisher(Box::new(broadcast));

    let handle = tokio::spawn(async move { service.run().await });

    let mut received = Vec::new();
    while received.len() < 3 {
        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(message);
    }
    shutdown.trigger();
    let stats = handle.await.unwrap().unwrap();

    // The file is reopened after EOF but nothing is replayed.
    assert_eq!(stats.records, 3);
    assert!(stats.malformed >= 1);
    let last = received.last().unwrap();
    assert!(last.map_valid);
    assert!(!last.map_enable);
    assert_eq!(last.arrival_distance, 500.0);
    assert_eq!(
        parse_epoch_line("100.400000  10  11 I opkrsigntype: 131", 0).unwrap().sec,
        last.ts
    );
}

#[tokio::test]
async fn non_utf8_line_does_not_stall_the_relay() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.log");
    std::fs::write(
        &path,
        b"100.000000 10 11 I opkrspddist: 500\n\xff\xfe\n100.500000 10 11 I opkrsigntype: 131\n",
    )
    .unwrap();

    let broadcast = BroadcastPublisher::new(16);
    let mut rx = broadcast.subscribe();
    let shutdown = Shutdown::new();
    let mut service = NaviService::new(
        Box::new(FileSource::file(&path)),
        NaviEngine::default(),
        SpeedFeed::fixed(20.0),
        Box::new(FixedFlags(None)),
        shutdown.clone(),
    )
    .with_clock(Box::new(ManualClock::new(50.0)))
    .with_reconnect_backoff(Duration::from_millis(5))
    .with_publisher(Box::new(broadcast));

    let handle = tokio::spawn(async move { service.run().await });

    let mut signs = Vec::new();
    while signs.len() < 2 {
        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        signs.push(message.safety_sign);
    }
    shutdown.trigger();
    let stats = handle.await.unwrap().unwrap();

    assert_eq!(signs, vec![0.0, 131.0]);
    assert_eq!(stats.records, 2);
    assert!(stats.malformed >= 1);
}
