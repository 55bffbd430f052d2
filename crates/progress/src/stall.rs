//! Stall detection.
//!
//! A build is stalled when it has made progress before, nothing has changed
//! for at least the stall threshold, and the machine is idle. A quiet build on
//! a busy machine is usually in a long compile or link step, so it counts as
//! busy rather than stalled.

use std::time::{Duration, Instant};

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallState {
    /// Progressing, or idle but busy
    #[default]
    Active,
    /// Idle past the threshold on an idle machine
    Stalled,
}

/// A state change produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallTransition {
    /// `Active -> Stalled`
    Stalled {
        /// Time since the last progress change
        idle: Duration,
    },
    /// `Stalled -> Active`
    Recovered,
}

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallAssessment {
    /// State after the evaluation
    pub state: StallState,

    /// Idle past the threshold but kept active by load
    pub busy: bool,

    /// Time since the last progress change
    pub idle: Duration,

    /// Transition fired by this evaluation, if any
    pub transition: Option<StallTransition>,
}

impl StallAssessment {
    /// Whether the build is stalled.
    pub fn is_stalled(&self) -> bool {
        self.state == StallState::Stalled
    }
}

/// Combines idle time with an external load signal.
#[derive(Debug, Clone)]
pub struct StallDetector {
    threshold: Duration,
    load_cutoff: f64,
    state: StallState,
}

impl StallDetector {
    /// Create a detector.
    pub fn new(threshold: Duration, load_cutoff: f64) -> Self {
        Self {
            threshold,
            load_cutoff,
            state: StallState::Active,
        }
    }

    /// Evaluate the detector for this tick.
    ///
    /// An unknown load (`None`) counts as busy, so a failed load sample never
    /// declares a stall on its own.
    pub fn evaluate(
        &mut self,
        now: Instant,
        current: u64,
        last_change: Instant,
        load: Option<f64>,
    ) -> StallAssessment {
        let idle = now.saturating_duration_since(last_change);
        let overdue = current > 0 && idle >= self.threshold;
        let machine_idle = load.is_some_and(|load| load < self.load_cutoff);

        let next = if overdue && machine_idle {
            StallState::Stalled
        } else {
            StallState::Active
        };

        let transition = match (self.state, next) {
            (StallState::Active, StallState::Stalled) => Some(StallTransition::Stalled { idle }),
            (StallState::Stalled, StallState::Active) => Some(StallTransition::Recovered),
            _ => None,
        };
        self.state = next;

        StallAssessment {
            state: next,
            busy: overdue && !machine_idle,
            idle,
            transition,
        }
    }

    /// Current state.
    pub fn state(&self) -> StallState {
        self.state
    }

    /// Return to `Active` without reporting a transition.
    pub fn reset(&mut self) {
        self.state = StallState::Active;
    }
}

impl Default for StallDetector {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 1.0)
    }
}
