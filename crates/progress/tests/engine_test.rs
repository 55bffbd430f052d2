//! End-to-end tests driving a full engine over a temporary log file.

use buildwatch_core::{BuildStatus, ControlEvent, MonitorConfig, MonitorEvent, MonitorEventKind};
use buildwatch_progress::{
    control_channel, event_channel, FixedLoad, MonitorEngine, RunOutcome, TickOutcome,
};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

fn append(file: &mut NamedTempFile, text: &str) {
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
}

fn drain(events: &mut mpsc::Receiver<MonitorEvent>) -> Vec<MonitorEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

fn stalls(kinds: &[MonitorEventKind]) -> usize {
    kinds
        .iter()
        .filter(|k| matches!(k, MonitorEventKind::Stalled { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_backlog_does_not_count_towards_speed() {
    let mut log = NamedTempFile::new().unwrap();
    for i in 1..=500 {
        append(&mut log, &format!("[{i}/1000] CXX obj/chrome/{i}.o\n"));
    }

    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default()).unwrap();
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.current, 500);
    assert_eq!(snap.speed, 0.0);
    assert!(snap.eta.is_none());
    assert_eq!(snap.elapsed, Duration::ZERO);

    tokio::time::advance(Duration::from_secs(10)).await;
    append(&mut log, "[520/1000] CXX obj/chrome/520.o\n");
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.speed, 2.0);
    assert_eq!(snap.elapsed, Duration::from_secs(10));
    let eta = snap.eta.unwrap();
    assert_eq!(eta.seconds, 240.0);
    assert_eq!(snap.speed_history, vec![0.0, 2.0]);
}

#[tokio::test(start_paused = true)]
async fn test_run_ends_on_completion() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[1/3] CXX obj/net/a.o\n");
    let path = log.path().to_path_buf();

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        append(&mut log, "[2/3] CXX obj/net/b.o\n");
        tokio::time::sleep(Duration::from_secs(5)).await;
        append(&mut log, "[3/3] LINK chrome\n");
        log
    });

    let (handler, mut events) = event_channel(32);
    let mut engine = MonitorEngine::new(&path, MonitorConfig::default())
        .unwrap()
        .with_handler(handler);

    let outcome = engine.run().await.unwrap();
    let _log = writer.await.unwrap();

    let RunOutcome::Completed(snap) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!((snap.current, snap.total), (3, 3));
    assert_eq!(snap.status, BuildStatus::Done);
    assert_eq!(snap.phase, "Linking Executables");
    assert_eq!(snap.percent(), 100.0);

    let kinds = drain(&mut events);
    assert!(matches!(kinds.last(), Some(MonitorEventKind::Completed { total: 3, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_log_to_appear() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rebuild.log");

    let mut engine = MonitorEngine::new(&path, MonitorConfig::default()).unwrap();
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Continue);
    assert!(!engine.is_caught_up());

    std::fs::write(&path, "[7/7] LINK chrome\n").unwrap();
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_quit_before_first_tick() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = control_channel(4);
    let mut engine = MonitorEngine::new(dir.path().join("never.log"), MonitorConfig::default())
        .unwrap()
        .with_controls(rx);

    tx.send(ControlEvent::Quit).await.unwrap();
    let outcome = engine.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Quit(_)));
}

#[tokio::test(start_paused = true)]
async fn test_quit_wakes_sleeping_loop() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[1/100] CXX a.o\n");

    let (tx, rx) = control_channel(4);
    let config = MonitorConfig::default().with_tick_interval(Duration::from_secs(3600));
    let mut engine = MonitorEngine::new(log.path(), config)
        .unwrap()
        .with_controls(rx);

    let sender = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(ControlEvent::from_key('q').unwrap()).await.unwrap();
    });

    let started = tokio::time::Instant::now();
    let outcome = engine.run().await.unwrap();
    sender.await.unwrap();

    assert_eq!(outcome.snapshot().current, 1);
    assert!(matches!(outcome, RunOutcome::Quit(_)));
    assert!(started.elapsed() < Duration::from_secs(3600));
}

#[tokio::test(start_paused = true)]
async fn test_stall_fires_once_at_threshold() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[10/100] CXX a.o\n");

    let (handler, mut events) = event_channel(32);
    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default())
        .unwrap()
        .with_load_probe(FixedLoad(0.1))
        .with_handler(handler);
    engine.tick().await.unwrap();

    tokio::time::advance(Duration::from_secs(299)).await;
    engine.tick().await.unwrap();
    assert_eq!(engine.snapshot().status, BuildStatus::Building);

    tokio::time::advance(Duration::from_secs(1)).await;
    engine.tick().await.unwrap();
    assert_eq!(engine.snapshot().status, BuildStatus::Stalled);

    tokio::time::advance(Duration::from_secs(60)).await;
    engine.tick().await.unwrap();

    let kinds = drain(&mut events);
    assert_eq!(stalls(&kinds), 1);

    append(&mut log, "[11/100] CXX b.o\n");
    engine.tick().await.unwrap();
    assert_eq!(engine.snapshot().status, BuildStatus::Building);
    assert_eq!(drain(&mut events), vec![MonitorEventKind::Recovered]);
}

#[tokio::test(start_paused = true)]
async fn test_muted_stall_keeps_status() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[10/100] CXX a.o\n");

    let (tx, rx) = control_channel(4);
    let (handler, mut events) = event_channel(32);
    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default())
        .unwrap()
        .with_controls(rx)
        .with_handler(handler);

    tx.send(ControlEvent::Mute).await.unwrap();
    engine.tick().await.unwrap();
    tokio::time::advance(Duration::from_secs(301)).await;
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert!(snap.muted);
    assert_eq!(snap.status, BuildStatus::Stalled);
    assert_eq!(stalls(&drain(&mut events)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_sticky_and_reported_once() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[4/10] CXX a.o\nFAILED: obj/a.o\n");

    let (handler, mut events) = event_channel(32);
    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default())
        .unwrap()
        .with_handler(handler);
    engine.tick().await.unwrap();
    assert_eq!(engine.snapshot().status, BuildStatus::Failed);

    append(&mut log, "[9/10] CXX b.o\nninja: build stopped: subcommand failed.\n");
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.current, 9);
    assert_eq!(snap.status, BuildStatus::Failed);

    let failures: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|k| matches!(k, MonitorEventKind::Failed { .. }))
        .collect();
    assert_eq!(
        failures,
        vec![MonitorEventKind::Failed {
            line: "FAILED: obj/a.o".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_build_never_reported_stalled() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[4/10] CXX obj/a.o\nFAILED: obj/b.o\n");

    let (handler, mut events) = event_channel(32);
    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default())
        .unwrap()
        .with_load_probe(FixedLoad(0.0))
        .with_handler(handler);
    engine.tick().await.unwrap();

    tokio::time::advance(Duration::from_secs(301)).await;
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.status, BuildStatus::Failed);
    assert!(!snap.busy);

    let kinds = drain(&mut events);
    assert_eq!(stalls(&kinds), 0);
    assert!(!kinds.contains(&MonitorEventKind::Recovered));
}

#[tokio::test(start_paused = true)]
async fn test_pause_skips_reading_and_stall() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[10/100] CXX a.o\n");

    let (tx, rx) = control_channel(4);
    let (handler, mut events) = event_channel(32);
    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default())
        .unwrap()
        .with_controls(rx)
        .with_handler(handler);
    engine.tick().await.unwrap();
    drain(&mut events);

    tx.send(ControlEvent::TogglePause).await.unwrap();
    append(&mut log, "[20/100] CXX b.o\n");
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.status, BuildStatus::Paused);
    assert_eq!(snap.current, 10);
    assert_eq!(drain(&mut events), vec![MonitorEventKind::PauseRequested]);

    // long pause, no stall once resumed
    tokio::time::advance(Duration::from_secs(900)).await;
    engine.tick().await.unwrap();
    tx.send(ControlEvent::Resume).await.unwrap();
    engine.tick().await.unwrap();

    let snap = engine.snapshot();
    assert_eq!(snap.status, BuildStatus::Building);
    assert_eq!(snap.current, 20);
    assert_eq!(drain(&mut events), vec![MonitorEventKind::ResumeRequested]);
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_published_to_subscribers() {
    let mut log = NamedTempFile::new().unwrap();
    append(&mut log, "[1/4] CXX obj/ui/a.o\n");

    let mut engine = MonitorEngine::new(log.path(), MonitorConfig::default()).unwrap();
    let mut rx = engine.subscribe();
    let session = engine.session();

    engine.tick().await.unwrap();
    assert!(rx.has_changed().unwrap());

    let snap = rx.borrow_and_update().clone();
    assert_eq!(snap.session, session);
    assert_eq!(snap.phase, "Building UI Components");
    assert_eq!(snap.recent_lines, vec!["CXX obj/ui/a.o"]);
}

#[tokio::test(start_paused = true)]
async fn test_run_reads_backlog_without_sleeping() {
    let mut log = NamedTempFile::new().unwrap();
    for i in 1..=10 {
        append(&mut log, &format!("[{i}/10] CXX obj/{i}.o\n"));
    }

    let config = MonitorConfig::default().with_max_lines_per_tick(2);
    let tick_interval = config.tick_interval;
    let mut engine = MonitorEngine::new(log.path(), config).unwrap();
    let mut snapshots = engine.subscribe();

    let started = tokio::time::Instant::now();
    let outcome = engine.run().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert!(started.elapsed() < tick_interval);
    assert!(snapshots.has_changed().unwrap());
    assert_eq!(snapshots.borrow_and_update().current, 10);
}

#[tokio::test]
async fn test_unreadable_log_is_fatal() {
    // a directory opens fine but fails on read
    let dir = tempfile::tempdir().unwrap();

    let mut engine = MonitorEngine::new(dir.path(), MonitorConfig::default()).unwrap();
    let err = engine.tick().await.unwrap_err();
    assert_eq!(err.operation(), "read");

    let mut engine = MonitorEngine::new(dir.path(), MonitorConfig::default()).unwrap();
    let err = engine.run().await.unwrap_err();
    assert_eq!(err.operation(), "read");
    assert!(err.to_string().contains(&dir.path().display().to_string()));
}
