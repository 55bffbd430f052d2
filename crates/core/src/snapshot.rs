//! Render snapshot - the immutable view handed to the renderer once per tick.

use crate::id::SessionId;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Overall build status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Progress is being made, or the machine is busy
    Building,
    /// No progress past the stall threshold while the machine is idle
    Stalled,
    /// A failure marker was seen
    Failed,
    /// The build was paused from the monitor
    Paused,
    /// `current == total > 0`
    Done,
}

impl BuildStatus {
    /// Derive the status with fixed precedence:
    /// paused > failed > done > stalled > building.
    pub fn resolve(paused: bool, failed: bool, done: bool, stalled: bool) -> Self {
        if paused {
            BuildStatus::Paused
        } else if failed {
            BuildStatus::Failed
        } else if done {
            BuildStatus::Done
        } else if stalled {
            BuildStatus::Stalled
        } else {
            BuildStatus::Building
        }
    }

    /// Short upper-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Building => "BUILDING",
            BuildStatus::Stalled => "STALLED",
            BuildStatus::Failed => "FAILED",
            BuildStatus::Paused => "PAUSED",
            BuildStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projected completion.
///
/// Only exists while the speed is positive; "unknown" is `None` at the
/// snapshot level, never a zero-second ETA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eta {
    /// Seconds until `current` reaches `total` at the current speed
    pub seconds: f64,

    /// Wall-clock time of the projected completion
    pub finish_at: Time,
}

impl Eta {
    /// Remaining time as a `Duration`.
    pub fn remaining(&self) -> Duration {
        Duration::try_from_secs_f64(self.seconds.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Session that produced this snapshot
    pub session: SessionId,

    /// When the snapshot was taken
    pub taken_at: Time,

    /// Completed units from the last accepted progress token
    pub current: u64,

    /// Announced total from the last accepted progress token (0 = unknown)
    pub total: u64,

    /// Highest total ever announced
    pub max_total_seen: u64,

    /// Windowed throughput in units per second
    pub speed: f64,

    /// Recent speeds, most-recent-last
    pub speed_history: Vec<f64>,

    /// Completion projection, absent while speed is zero
    pub eta: Option<Eta>,

    /// Last detected build phase
    pub phase: String,

    /// Overall status
    pub status: BuildStatus,

    /// Idle past the stall threshold but kept active by load
    pub busy: bool,

    /// Load signal sampled on this tick, if any
    pub load: Option<f64>,

    /// Alert notifications are silenced
    pub muted: bool,

    /// Recent log lines, most-recent-last
    pub recent_lines: Vec<String>,

    /// Time since the monitor went live
    pub elapsed: Duration,
}

impl Snapshot {
    /// Units left to build.
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.current)
    }

    /// Completion percentage, 0 while the total is unknown.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64 * 100.0
        }
    }

    /// Whether the build has reached its announced total.
    pub fn is_complete(&self) -> bool {
        self.current > 0 && self.current == self.total
    }
}
