//! The monitor engine - runs the tick loop.

use crate::error::Result;
use crate::eta::EtaCalculator;
use crate::extractor::ProgressExtractor;
use crate::handler::MonitorHandler;
use crate::load::{FixedLoad, LoadProbe};
use crate::phase::PhaseClassifier;
use crate::speed::SpeedEstimator;
use crate::stall::{StallDetector, StallTransition};
use crate::state::{MonitorState, GRAPH_VERIFICATION_PHASE};
use buildwatch_core::{
    BuildStatus, ControlEvent, MonitorConfig, MonitorEvent, MonitorEventKind, SessionId,
    Snapshot,
};
use buildwatch_tail::LogTailer;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Create the bounded channel an input task uses to send control events.
pub fn control_channel(
    capacity: usize,
) -> (mpsc::Sender<ControlEvent>, mpsc::Receiver<ControlEvent>) {
    mpsc::channel(capacity.max(1))
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep going
    Continue,
    /// `current == total > 0` was observed
    Completed,
    /// A quit control event was received
    Quit,
}

/// How [`MonitorEngine::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The build reached its announced total
    Completed(Snapshot),
    /// The user asked to stop
    Quit(Snapshot),
}

impl RunOutcome {
    /// Final snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            RunOutcome::Completed(snapshot) | RunOutcome::Quit(snapshot) => snapshot,
        }
    }
}

/// The monitor engine.
///
/// Runs the tick loop:
/// ```text
/// Drain controls → Tail → Extract → Estimate speed → Stall check → Publish
/// ```
pub struct MonitorEngine {
    session: SessionId,
    config: MonitorConfig,
    path: PathBuf,
    tailer: Option<LogTailer>,
    extractor: ProgressExtractor,
    classifier: PhaseClassifier,
    speed: SpeedEstimator,
    stall: StallDetector,
    eta: EtaCalculator,
    state: MonitorState,
    load: Box<dyn LoadProbe>,
    handlers: Vec<Box<dyn MonitorHandler>>,
    controls: Option<mpsc::Receiver<ControlEvent>>,
    snapshots: watch::Sender<Snapshot>,
    caught_up: bool,
    backlog_lines: u64,
}

impl MonitorEngine {
    /// Create an engine for the log at `path`.
    ///
    /// The file does not have to exist yet.
    pub fn new(path: impl AsRef<Path>, config: MonitorConfig) -> Result<Self> {
        config.validate()?;

        let now = now();
        let session = SessionId::new();
        let state = MonitorState::new(&config, now);
        let (snapshots, _) = watch::channel(state.snapshot(session, now, None));

        Ok(Self {
            session,
            path: path.as_ref().to_path_buf(),
            tailer: None,
            extractor: ProgressExtractor::new(config.failure_markers.clone()),
            classifier: PhaseClassifier::new(config.phase_rules.clone()),
            speed: SpeedEstimator::new(config.speed_window, config.min_speed_span),
            stall: StallDetector::new(config.stall_threshold, config.load_cutoff),
            eta: EtaCalculator,
            state,
            // without a probe, time alone decides
            load: Box::new(FixedLoad(0.0)),
            handlers: Vec::new(),
            controls: None,
            snapshots,
            caught_up: false,
            backlog_lines: 0,
            config,
        })
    }

    /// Set the load signal source.
    pub fn with_load_probe(mut self, probe: impl LoadProbe + 'static) -> Self {
        self.load = Box::new(probe);
        self
    }

    /// Register an event handler.
    pub fn with_handler(mut self, handler: impl MonitorHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Attach the receiving end of a [`control_channel`].
    pub fn with_controls(mut self, controls: mpsc::Receiver<ControlEvent>) -> Self {
        self.controls = Some(controls);
        self
    }

    /// Subscribe to the snapshot published after every tick.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Most recently published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Session identity.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Live state.
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Whether the backlog has been consumed.
    pub fn is_caught_up(&self) -> bool {
        self.caught_up
    }

    /// Run one tick.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let now = now();

        // 1. Controls
        if self.drain_controls(now) {
            self.publish(now);
            return Ok(TickOutcome::Quit);
        }

        if self.state.is_paused() {
            self.publish(now);
            return Ok(TickOutcome::Continue);
        }

        // 2. Tail
        if self.tailer.is_none() {
            self.open_log().await?;
        }
        self.read_log(now).await?;

        // 3. Speed, once live
        if self.caught_up {
            let speed = self.speed.record(now, self.state.current());
            self.state.record_speed(speed);
        }

        // 4. Stall
        let load = match self.load.sample().await {
            Ok(load) => Some(load),
            Err(e) => {
                debug!(error = %e, "Load sample unavailable, assuming busy");
                None
            }
        };
        let overdue = self.evaluate_stall(now, load);

        if let Some(limit) = self.config.graph_check_speed {
            if !overdue && self.state.speed() > limit {
                self.state.set_phase(GRAPH_VERIFICATION_PHASE);
            }
        }

        debug!(
            current = self.state.current(),
            total = self.state.total(),
            speed = self.state.speed(),
            phase = self.state.phase(),
            "Tick"
        );

        // 5. Completion
        let snapshot = self.publish(now);
        if self.state.is_complete() {
            self.emit(MonitorEventKind::Completed {
                total: snapshot.total,
                elapsed: snapshot.elapsed,
            });
            return Ok(TickOutcome::Completed);
        }

        Ok(TickOutcome::Continue)
    }

    /// Returns whether the build is past the stall threshold (stalled or busy).
    ///
    /// A failed build is never reported as stalled.
    fn evaluate_stall(&mut self, now: Instant, load: Option<f64>) -> bool {
        if self.state.has_failed() {
            self.stall.reset();
            self.state.set_activity(false, false, load);
            return false;
        }

        let assessment = self
            .stall
            .evaluate(now, self.state.current(), self.state.last_change(), load);
        self.state
            .set_activity(assessment.is_stalled(), assessment.busy, load);

        match assessment.transition {
            Some(StallTransition::Stalled { idle }) => {
                self.emit(MonitorEventKind::Stalled {
                    idle,
                    current: self.state.current(),
                    total: self.state.total(),
                });
            }
            Some(StallTransition::Recovered) => self.emit(MonitorEventKind::Recovered),
            None => {}
        }

        assessment.is_stalled() || assessment.busy
    }

    /// Run the loop until the build completes or a quit arrives.
    ///
    /// Sleeps between ticks; a control event arriving while asleep wakes the
    /// loop early. Backlog batches already on disk are read back to back.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        info!(session = %self.session, path = %self.path.display(), "Starting monitor");

        loop {
            match self.tick().await? {
                TickOutcome::Completed => {
                    info!(session = %self.session, "Monitor finished, build complete");
                    return Ok(RunOutcome::Completed(self.snapshot()));
                }
                TickOutcome::Quit => {
                    info!(session = %self.session, "Monitor stopped on request");
                    return Ok(RunOutcome::Quit(self.snapshot()));
                }
                TickOutcome::Continue => {}
            }

            if self.tailer.is_some() && !self.caught_up && !self.state.is_paused() {
                tokio::task::yield_now().await;
                continue;
            }

            let interval = if self.tailer.is_none() {
                self.config.file_poll_interval
            } else {
                self.config.tick_interval
            };
            if self.wait(interval).await {
                self.publish(now());
                return Ok(RunOutcome::Quit(self.snapshot()));
            }
        }
    }

    /// Sleep for `interval`, returning `true` if a quit arrived meanwhile.
    async fn wait(&mut self, interval: Duration) -> bool {
        let received = match self.controls.as_mut() {
            Some(controls) => tokio::select! {
                _ = tokio::time::sleep(interval) => None,
                event = controls.recv() => Some(event),
            },
            None => {
                tokio::time::sleep(interval).await;
                None
            }
        };

        match received {
            Some(Some(event)) => self.handle_control(event, now()),
            Some(None) => {
                debug!("Control channel closed");
                self.controls = None;
                false
            }
            None => false,
        }
    }

    fn drain_controls(&mut self, now: Instant) -> bool {
        let mut quit = false;
        while let Some(controls) = self.controls.as_mut() {
            match controls.try_recv() {
                Ok(event) => quit |= self.handle_control(event, now),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("Control channel closed");
                    self.controls = None;
                }
            }
        }
        quit
    }

    fn handle_control(&mut self, event: ControlEvent, now: Instant) -> bool {
        debug!(%event, "Control event");
        let outcome = self.state.apply_control(event, now);
        if outcome.pause_changed {
            self.stall.reset();
        }
        if let Some(kind) = outcome.event {
            self.emit(kind);
        }
        outcome.quit
    }

    async fn open_log(&mut self) -> Result<()> {
        let Some(tailer) = LogTailer::try_open(&self.path).await? else {
            return Ok(());
        };
        let tailer =
            tailer.with_limits(self.config.max_lines_per_tick, self.config.max_read_bytes);
        self.emit(MonitorEventKind::LogOpened {
            path: self.path.display().to_string(),
        });
        self.tailer = Some(tailer);
        Ok(())
    }

    async fn read_log(&mut self, now: Instant) -> Result<()> {
        let Some(tailer) = self.tailer.as_mut() else {
            return Ok(());
        };
        let batch = tailer.read_lines().await?;

        for line in &batch.lines {
            let update = self
                .state
                .ingest_line(line, &self.extractor, &self.classifier, now);
            if update.failed {
                self.emit(MonitorEventKind::Failed { line: line.clone() });
            }
        }

        if !self.caught_up {
            self.backlog_lines += batch.lines.len() as u64;
            if !batch.has_more {
                // backlog speed would be meaningless, start measuring from here
                self.caught_up = true;
                self.speed.reset();
                self.state.go_live(now);
                self.emit(MonitorEventKind::CaughtUp {
                    backlog_lines: self.backlog_lines,
                });
            }
        }
        Ok(())
    }

    fn emit(&self, kind: MonitorEventKind) {
        if kind.is_alert() && self.state.is_muted() {
            debug!(?kind, "Alert muted");
            return;
        }
        let event = MonitorEvent::new(self.session, kind);
        for handler in &self.handlers {
            handler.on_event(&event);
        }
    }

    fn publish(&self, now: Instant) -> Snapshot {
        let eta = self.eta.estimate(
            self.state.current(),
            self.state.total(),
            self.state.speed(),
            chrono::Utc::now(),
        );
        let snapshot = self.state.snapshot(self.session, now, eta);
        if snapshot.status != self.snapshots.borrow().status {
            match snapshot.status {
                BuildStatus::Stalled | BuildStatus::Failed => {
                    warn!(session = %self.session, status = %snapshot.status, "Status changed");
                }
                _ => {
                    info!(session = %self.session, status = %snapshot.status, "Status changed");
                }
            }
        }
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}

/// Engine clock. Goes through tokio so paused test time applies.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
