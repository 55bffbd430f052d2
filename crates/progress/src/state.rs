//! Mutable monitor state, owned by the tick loop.

use crate::extractor::{strip_progress, ProgressExtractor, ProgressToken};
use crate::phase::PhaseClassifier;
use buildwatch_core::{
    BuildStatus, ControlEvent, CounterPolicy, Eta, MonitorConfig, MonitorEventKind, SessionId,
    Snapshot,
};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

/// Phase label used by the graph-verification heuristic.
pub const GRAPH_VERIFICATION_PHASE: &str = "Graph Verification";

/// What a single log line changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineUpdate {
    /// A progress token was accepted
    pub token_applied: bool,

    /// `current` strictly increased
    pub progressed: bool,

    /// This line flipped the failure flag
    pub failed: bool,
}

/// What a control event changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlOutcome {
    /// Event to emit for the process-signal collaborator
    pub event: Option<MonitorEventKind>,

    /// The pause flag flipped
    pub pause_changed: bool,

    /// The loop should stop
    pub quit: bool,
}

/// Aggregate build state.
///
/// `current` and `total` always come from the same token, `last_change`
/// moves only when `current` strictly increases, and `has_failed` never goes
/// back to false.
#[derive(Debug, Clone)]
pub struct MonitorState {
    current: u64,
    total: u64,
    max_total_seen: u64,
    start_time: Instant,
    last_change: Instant,
    speed: f64,
    speed_history: VecDeque<f64>,
    speed_history_capacity: usize,
    phase: String,
    is_stalled: bool,
    busy: bool,
    load: Option<f64>,
    has_failed: bool,
    paused: bool,
    muted: bool,
    recent_lines: VecDeque<String>,
    recent_capacity: usize,
    recent_width: usize,
    policy: CounterPolicy,
}

impl MonitorState {
    /// Fresh state at monitor start.
    pub fn new(config: &MonitorConfig, now: Instant) -> Self {
        Self {
            current: 0,
            total: 0,
            max_total_seen: 0,
            start_time: now,
            last_change: now,
            speed: 0.0,
            speed_history: VecDeque::with_capacity(config.speed_history),
            speed_history_capacity: config.speed_history.max(1),
            phase: config.initial_phase.clone(),
            is_stalled: false,
            busy: false,
            load: None,
            has_failed: false,
            paused: false,
            muted: false,
            recent_lines: VecDeque::with_capacity(config.recent_lines),
            recent_capacity: config.recent_lines.max(1),
            recent_width: config.recent_line_width.max(1),
            policy: config.counter_policy,
        }
    }

    /// Fold one log line into the state.
    pub fn ingest_line(
        &mut self,
        line: &str,
        extractor: &ProgressExtractor,
        classifier: &PhaseClassifier,
        now: Instant,
    ) -> LineUpdate {
        let scan = extractor.scan(line);
        let mut update = LineUpdate::default();

        if let Some(token) = scan.progress {
            let (applied, progressed) = self.apply_token(token, now);
            update.token_applied = applied;
            update.progressed = progressed;
        }

        if scan.failure.is_some() && !self.has_failed {
            self.has_failed = true;
            update.failed = true;
        }

        let content = strip_progress(line);
        let content = content.trim();
        if !content.is_empty() {
            self.push_recent(content);
            if let Some(label) = classifier.classify(content) {
                self.set_phase(label);
            }
        }

        update
    }

    /// Apply a progress token under the configured policy.
    ///
    /// Returns `(applied, progressed)`.
    pub fn apply_token(&mut self, token: ProgressToken, now: Instant) -> (bool, bool) {
        self.max_total_seen = self.max_total_seen.max(token.total);

        let accept = match self.policy {
            CounterPolicy::Ratchet => token.current >= self.current,
            CounterPolicy::Overwrite => true,
        };
        if !accept {
            debug!(
                current = self.current,
                ignored = token.current,
                "Ignoring regressing progress token"
            );
            return (false, false);
        }

        let progressed = token.current > self.current;
        if progressed {
            self.last_change = now;
        }
        self.current = token.current;
        self.total = token.total;
        (true, progressed)
    }

    fn push_recent(&mut self, content: &str) {
        if self.recent_lines.len() == self.recent_capacity {
            self.recent_lines.pop_front();
        }
        self.recent_lines
            .push_back(content.chars().take(self.recent_width).collect());
    }

    /// Apply a control event. Only this method touches pause and mute.
    pub fn apply_control(&mut self, event: ControlEvent, now: Instant) -> ControlOutcome {
        let mut outcome = ControlOutcome::default();
        match event {
            ControlEvent::Pause => self.set_paused(true, now, &mut outcome),
            ControlEvent::Resume => self.set_paused(false, now, &mut outcome),
            ControlEvent::TogglePause => self.set_paused(!self.paused, now, &mut outcome),
            ControlEvent::Mute => self.muted = true,
            ControlEvent::Unmute => self.muted = false,
            ControlEvent::ToggleMute => self.muted = !self.muted,
            ControlEvent::Quit => outcome.quit = true,
        }
        outcome
    }

    fn set_paused(&mut self, paused: bool, now: Instant, outcome: &mut ControlOutcome) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        // paused time never counts as idle time
        self.last_change = now;
        self.is_stalled = false;
        self.busy = false;
        outcome.pause_changed = true;
        outcome.event = Some(if paused {
            MonitorEventKind::PauseRequested
        } else {
            MonitorEventKind::ResumeRequested
        });
    }

    /// Redefine the nominal start once the backlog has been read.
    pub fn go_live(&mut self, now: Instant) {
        self.start_time = now;
        self.last_change = now;
        self.speed = 0.0;
        self.speed_history.clear();
    }

    /// Store a freshly computed speed and push it onto the trend.
    pub fn record_speed(&mut self, speed: f64) {
        self.speed = speed.max(0.0);
        if self.speed_history.len() == self.speed_history_capacity {
            self.speed_history.pop_front();
        }
        self.speed_history.push_back(self.speed);
    }

    /// Store the outcome of this tick's stall evaluation.
    pub fn set_activity(&mut self, stalled: bool, busy: bool, load: Option<f64>) {
        self.is_stalled = stalled;
        self.busy = busy;
        self.load = load;
    }

    /// Override the phase label.
    pub fn set_phase(&mut self, label: &str) {
        if self.phase != label {
            self.phase = label.to_string();
        }
    }

    /// Completed units.
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Announced total (0 = unknown).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Highest total seen.
    pub fn max_total_seen(&self) -> u64 {
        self.max_total_seen
    }

    /// Nominal start of the session.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Last time `current` strictly increased (or pause flipped).
    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    /// Windowed speed.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Last detected phase.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Whether the build is stalled.
    pub fn is_stalled(&self) -> bool {
        self.is_stalled
    }

    /// Whether a failure marker was ever seen.
    pub fn has_failed(&self) -> bool {
        self.has_failed
    }

    /// Whether the build is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether alerts are muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Recent lines, most-recent-last.
    pub fn recent_lines(&self) -> impl Iterator<Item = &str> {
        self.recent_lines.iter().map(String::as_str)
    }

    /// `current == total > 0`.
    pub fn is_complete(&self) -> bool {
        self.current > 0 && self.current == self.total
    }

    /// Overall status with fixed precedence.
    pub fn status(&self) -> BuildStatus {
        BuildStatus::resolve(self.paused, self.has_failed, self.is_complete(), self.is_stalled)
    }

    /// Build a render snapshot.
    pub fn snapshot(&self, session: SessionId, now: Instant, eta: Option<Eta>) -> Snapshot {
        Snapshot {
            session,
            taken_at: chrono::Utc::now(),
            current: self.current,
            total: self.total,
            max_total_seen: self.max_total_seen,
            speed: self.speed,
            speed_history: self.speed_history.iter().copied().collect(),
            eta,
            phase: self.phase.clone(),
            status: self.status(),
            busy: self.busy,
            load: self.load,
            muted: self.muted,
            recent_lines: self.recent_lines.iter().cloned().collect(),
            elapsed: now.saturating_duration_since(self.start_time),
        }
    }
}
