//! Tailer errors.

use std::path::PathBuf;

/// Error type for tail operations.
pub type Result<T> = std::result::Result<T, TailError>;

/// Errors that can occur while tailing a log.
///
/// Each variant names the operation that failed so the caller can report it
/// after restoring its own display state.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// The log exists but could not be opened
    #[error("failed to open log {path}: {source}")]
    Open {
        /// Log path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Seeking to the cursor failed
    #[error("failed to seek log {path}: {source}")]
    Seek {
        /// Log path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading appended bytes failed
    #[error("failed to read log {path}: {source}")]
    Read {
        /// Log path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl TailError {
    /// Name of the failed operation.
    pub fn operation(&self) -> &'static str {
        match self {
            TailError::Open { .. } => "open",
            TailError::Seek { .. } => "seek",
            TailError::Read { .. } => "read",
        }
    }

    /// Path of the log involved.
    pub fn path(&self) -> &std::path::Path {
        match self {
            TailError::Open { path, .. }
            | TailError::Seek { path, .. }
            | TailError::Read { path, .. } => path,
        }
    }
}
