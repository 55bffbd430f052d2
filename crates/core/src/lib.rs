//! buildwatch core data models.
//!
//! This crate defines the plain data shared between the log tailer, the
//! progress engine and the out-of-process collaborators (renderer, alerting,
//! process control, input capture).

#![warn(missing_docs)]

mod id;
mod config;
mod control;
mod event;
mod snapshot;

pub use id::SessionId;
pub use config::{
    default_phase_rules, ConfigError, CounterPolicy, MonitorConfig, PhaseRule,
    BUILD_STOPPED_MARKER, FAILED_STEP_MARKER,
};
pub use control::ControlEvent;
pub use event::{MonitorEvent, MonitorEventKind};
pub use snapshot::{BuildStatus, Eta, Snapshot};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
