//! Engine error types.

use buildwatch_core::ConfigError;
use buildwatch_tail::TailError;

/// Fatal monitor errors. Anything here ends the tick loop.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The log became unreadable after it was opened
    #[error(transparent)]
    Tail(#[from] TailError),

    /// The configuration was rejected before the loop started
    #[error("invalid monitor config: {0}")]
    Config(#[from] ConfigError),
}

impl MonitorError {
    /// Name of the operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            MonitorError::Tail(e) => e.operation(),
            MonitorError::Config(_) => "configure",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
