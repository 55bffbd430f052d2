//! Append-only log tailer.

use crate::error::{Result, TailError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

/// Default upper bound on lines handed out per call.
pub const DEFAULT_MAX_LINES: usize = 5000;

/// Default upper bound on bytes read from disk per call.
pub const DEFAULT_MAX_READ_BYTES: usize = 4 * 1024 * 1024;

/// Byte offset of the first byte not yet read from the log.
///
/// Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogCursor {
    /// Bytes consumed so far
    pub byte_offset: u64,
}

/// Lines returned by one [`LogTailer::read_lines`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailBatch {
    /// Complete lines, oldest first, without their line terminator
    pub lines: Vec<String>,

    /// More lines are already known to be waiting: either buffered, or the
    /// last read stopped at the byte budget rather than at end of file
    pub has_more: bool,
}

impl TailBatch {
    /// Whether the batch carries no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Reads the lines appended to a log since the previous call.
///
/// A trailing line without its `\n` is held back until it is completed.
/// Truncation and rotation are not detected: if the file shrinks below the
/// cursor, reads return nothing until it grows past the cursor again.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    file: File,
    cursor: LogCursor,
    partial: Vec<u8>,
    pending: VecDeque<String>,
    more_on_disk: bool,
    max_lines: usize,
    max_read_bytes: usize,
}

impl LogTailer {
    /// Open an existing log, starting at its first byte.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match File::open(&path).await {
            Ok(file) => Ok(Self::from_file(path, file)),
            Err(source) => Err(TailError::Open { path, source }),
        }
    }

    /// Open the log if it exists yet.
    ///
    /// A missing file is not an error and yields `None`; any other open
    /// failure is.
    pub async fn try_open(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        match File::open(&path).await {
            Ok(file) => Ok(Some(Self::from_file(path, file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TailError::Open { path, source }),
        }
    }

    /// Poll until the log exists, then open it.
    pub async fn wait_for(path: impl AsRef<Path>, poll_interval: Duration) -> Result<Self> {
        let path = path.as_ref();
        loop {
            if let Some(tailer) = Self::try_open(path).await? {
                return Ok(tailer);
            }
            trace!(path = %path.display(), "Log not there yet");
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn from_file(path: PathBuf, file: File) -> Self {
        debug!(path = %path.display(), "Opened log");
        Self {
            path,
            file,
            cursor: LogCursor::default(),
            partial: Vec::new(),
            pending: VecDeque::new(),
            more_on_disk: false,
            max_lines: DEFAULT_MAX_LINES,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }

    /// Set the per-call line and byte budgets. Zero is raised to one.
    pub fn with_limits(mut self, max_lines: usize, max_read_bytes: usize) -> Self {
        self.max_lines = max_lines.max(1);
        self.max_read_bytes = max_read_bytes.max(1);
        self
    }

    /// Path of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read position.
    pub fn cursor(&self) -> LogCursor {
        self.cursor
    }

    /// Complete lines decoded but not handed out yet.
    pub fn buffered_lines(&self) -> usize {
        self.pending.len()
    }

    /// Return up to the line budget of new complete lines.
    ///
    /// Reads from disk only when the buffered lines cannot fill the budget.
    pub async fn read_lines(&mut self) -> Result<TailBatch> {
        if self.pending.len() < self.max_lines {
            self.fill().await?;
        }

        let take = self.pending.len().min(self.max_lines);
        let lines: Vec<String> = self.pending.drain(..take).collect();

        Ok(TailBatch {
            lines,
            has_more: !self.pending.is_empty() || self.more_on_disk,
        })
    }

    async fn fill(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.cursor.byte_offset))
            .await
            .map_err(|source| TailError::Seek {
                path: self.path.clone(),
                source,
            })?;

        let mut buf = Vec::new();
        (&mut self.file)
            .take(self.max_read_bytes as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|source| TailError::Read {
                path: self.path.clone(),
                source,
            })?;

        self.more_on_disk = buf.len() >= self.max_read_bytes;
        if buf.is_empty() {
            return Ok(());
        }

        self.cursor.byte_offset += buf.len() as u64;
        trace!(bytes = buf.len(), offset = self.cursor.byte_offset, "Read log chunk");

        self.partial.extend_from_slice(&buf);
        self.split_partial();
        Ok(())
    }

    /// Move every complete line out of the partial buffer.
    fn split_partial(&mut self) {
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return;
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        for raw in complete[..complete.len() - 1].split(|b| *b == b'\n') {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            self.pending.push_back(String::from_utf8_lossy(raw).into_owned());
        }
    }
}
