//! Monitor configuration.
//!
//! Loading a configuration (flags, files) is the embedding process's job; this
//! module only defines the knobs, their defaults and their validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marker the build tool prints when it gives up after a failed step.
pub const BUILD_STOPPED_MARKER: &str = "ninja: build stopped: subcommand failed";

/// Marker printed in front of every failed build step.
pub const FAILED_STEP_MARKER: &str = "FAILED:";

/// Errors raised by [`MonitorConfig::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A duration knob was zero
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending field
        field: &'static str,
    },

    /// A capacity or budget knob was zero
    #[error("{field} must be at least 1")]
    ZeroCapacity {
        /// Name of the offending field
        field: &'static str,
    },

    /// A phase rule has an empty pattern and would match every line
    #[error("phase rule #{index} has an empty pattern")]
    EmptyPhasePattern {
        /// Position of the rule in the list
        index: usize,
    },

    /// The load cutoff is negative or not a number
    #[error("load cutoff must be a non-negative number, got {0}")]
    InvalidLoadCutoff(f64),
}

/// How a matched `[current/total]` token updates the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterPolicy {
    /// Accept a token only when its count is not below the current count.
    #[default]
    Ratchet,
    /// Accept every token, even when the count goes backwards.
    Overwrite,
}

/// One `(substring, label)` entry of the ordered phase rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRule {
    /// Substring searched for in the log line
    pub pattern: String,

    /// Human-readable phase label
    pub label: String,
}

impl PhaseRule {
    /// Create a new rule.
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
        }
    }
}

/// Phase rules for a Chromium-style tree, most specific first.
pub fn default_phase_rules() -> Vec<PhaseRule> {
    vec![
        PhaseRule::new("v8/", "Compiling V8 JS Engine"),
        PhaseRule::new("blink/", "Compiling Blink Renderer"),
        PhaseRule::new("chrome/", "Building Chrome Core"),
        PhaseRule::new("net/", "Building Network Stack"),
        PhaseRule::new("ui/", "Building UI Components"),
        PhaseRule::new("mojom", "Generating IPC Bindings"),
        PhaseRule::new("LINK", "Linking Executables"),
    ]
}

/// Configuration for the monitor engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sleep between two ticks
    pub tick_interval: Duration,

    /// Sleep between two checks while waiting for the log file to appear
    pub file_poll_interval: Duration,

    /// Horizon of the sliding speed window
    pub speed_window: Duration,

    /// Minimum time span the window must cover before a speed is reported
    pub min_speed_span: Duration,

    /// Idle time after which a quiet build counts as stalled
    pub stall_threshold: Duration,

    /// Load at or above which an idle build counts as busy, not stalled
    pub load_cutoff: f64,

    /// Upper bound on log lines processed per tick
    pub max_lines_per_tick: usize,

    /// Upper bound on bytes pulled from the log per read
    pub max_read_bytes: usize,

    /// Capacity of the recent-lines buffer
    pub recent_lines: usize,

    /// Recent lines are cut to this many characters
    pub recent_line_width: usize,

    /// Capacity of the speed trend buffer
    pub speed_history: usize,

    /// How progress tokens update the counters
    pub counter_policy: CounterPolicy,

    /// Exact substrings that mark the build as failed
    pub failure_markers: Vec<String>,

    /// Ordered phase rules; the first match wins
    pub phase_rules: Vec<PhaseRule>,

    /// Phase label shown before any rule matched
    pub initial_phase: String,

    /// Speed above which the phase is reported as graph verification;
    /// `None` turns the heuristic off
    pub graph_check_speed: Option<f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            file_poll_interval: Duration::from_millis(500),
            speed_window: Duration::from_secs(60),
            min_speed_span: Duration::from_secs(1),
            stall_threshold: Duration::from_secs(300), // 5 minutes
            load_cutoff: 1.0,
            max_lines_per_tick: 5000,
            max_read_bytes: 4 * 1024 * 1024,
            recent_lines: 15,
            recent_line_width: 120,
            speed_history: 50,
            counter_policy: CounterPolicy::Ratchet,
            failure_markers: vec![
                BUILD_STOPPED_MARKER.to_string(),
                FAILED_STEP_MARKER.to_string(),
            ],
            phase_rules: default_phase_rules(),
            initial_phase: "Initializing".to_string(),
            graph_check_speed: Some(50.0),
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the poll interval used while waiting for the log file.
    pub fn with_file_poll_interval(mut self, interval: Duration) -> Self {
        self.file_poll_interval = interval;
        self
    }

    /// Set the speed window horizon.
    pub fn with_speed_window(mut self, window: Duration) -> Self {
        self.speed_window = window;
        self
    }

    /// Set the stall threshold.
    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    /// Set the load cutoff.
    pub fn with_load_cutoff(mut self, cutoff: f64) -> Self {
        self.load_cutoff = cutoff;
        self
    }

    /// Set the per-tick line budget.
    pub fn with_max_lines_per_tick(mut self, max: usize) -> Self {
        self.max_lines_per_tick = max;
        self
    }

    /// Set the counter update policy.
    pub fn with_counter_policy(mut self, policy: CounterPolicy) -> Self {
        self.counter_policy = policy;
        self
    }

    /// Replace the phase rules.
    pub fn with_phase_rules(mut self, rules: Vec<PhaseRule>) -> Self {
        self.phase_rules = rules;
        self
    }

    /// Report graph verification above the given speed.
    pub fn with_graph_check_speed(mut self, speed: f64) -> Self {
        self.graph_check_speed = Some(speed);
        self
    }

    /// Turn the graph-verification heuristic off.
    pub fn without_graph_check(mut self) -> Self {
        self.graph_check_speed = None;
        self
    }

    /// Check that every knob holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("tick_interval", self.tick_interval),
            ("file_poll_interval", self.file_poll_interval),
            ("speed_window", self.speed_window),
            ("stall_threshold", self.stall_threshold),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        let capacities = [
            ("max_lines_per_tick", self.max_lines_per_tick),
            ("max_read_bytes", self.max_read_bytes),
            ("recent_lines", self.recent_lines),
            ("recent_line_width", self.recent_line_width),
            ("speed_history", self.speed_history),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity { field });
            }
        }

        if let Some(index) = self.phase_rules.iter().position(|r| r.pattern.is_empty()) {
            return Err(ConfigError::EmptyPhasePattern { index });
        }

        if self.load_cutoff.is_nan() || self.load_cutoff < 0.0 {
            return Err(ConfigError::InvalidLoadCutoff(self.load_cutoff));
        }

        Ok(())
    }
}
