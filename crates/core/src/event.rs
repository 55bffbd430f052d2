//! Outgoing events - consumed by alerting and process-control collaborators.

use crate::id::SessionId;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEventKind {
    /// The log file appeared and was opened
    LogOpened {
        /// Path of the log
        path: String,
    },

    /// The backlog of an existing log has been read; figures are live from here
    CaughtUp {
        /// Lines consumed before going live
        backlog_lines: u64,
    },

    /// No progress for longer than the stall threshold while the machine is idle
    Stalled {
        /// Time since the last progress change
        idle: Duration,
        /// Count at the time of the stall
        current: u64,
        /// Total at the time of the stall
        total: u64,
    },

    /// A stalled build is moving (or busy) again
    Recovered,

    /// A failure marker matched
    Failed {
        /// The log line carrying the marker
        line: String,
    },

    /// The build process should be suspended
    PauseRequested,

    /// The build process should be continued
    ResumeRequested,

    /// `current == total > 0`
    Completed {
        /// Final count
        total: u64,
        /// Time since the monitor went live
        elapsed: Duration,
    },
}

impl MonitorEventKind {
    /// Whether this event is an alert that muting silences.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            MonitorEventKind::Stalled { .. } | MonitorEventKind::Failed { .. }
        )
    }
}

/// An event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Session that emitted the event
    pub session: SessionId,

    /// When it happened
    pub timestamp: Time,

    /// What happened
    pub kind: MonitorEventKind,
}

impl MonitorEvent {
    /// Create a new event stamped with the current time.
    pub fn new(session: SessionId, kind: MonitorEventKind) -> Self {
        Self {
            session,
            timestamp: chrono::Utc::now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stall_and_failure_are_alerts() {
        assert!(MonitorEventKind::Failed { line: "FAILED: x".into() }.is_alert());
        assert!(MonitorEventKind::Stalled {
            idle: Duration::from_secs(301),
            current: 5,
            total: 10,
        }
        .is_alert());
        assert!(!MonitorEventKind::PauseRequested.is_alert());
        assert!(!MonitorEventKind::Recovered.is_alert());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = MonitorEvent::new(SessionId::new(), MonitorEventKind::ResumeRequested);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "resume_requested");
    }
}
