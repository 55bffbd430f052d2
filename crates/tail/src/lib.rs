//! Resumable tailing of a growing build log.
//!
//! The tailer owns a byte cursor into an append-only file and hands out the
//! complete lines written since the previous call, a bounded batch at a time.

#![warn(missing_docs)]

pub mod error;
pub mod tailer;

pub use error::{Result, TailError};
pub use tailer::{LogCursor, LogTailer, TailBatch, DEFAULT_MAX_LINES, DEFAULT_MAX_READ_BYTES};
