//! Progress token and failure marker extraction.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)/(\d+)\]").expect("progress token pattern is valid"))
}

fn token_with_padding() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[\d+/\d+\]\s*").expect("progress token pattern is valid"))
}

/// A matched `[current/total]` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressToken {
    /// Completed units
    pub current: u64,
    /// Announced total, always positive
    pub total: u64,
}

/// What one log line says about the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineScan<'a> {
    /// First valid progress token in the line
    pub progress: Option<ProgressToken>,

    /// Failure marker found in the line
    pub failure: Option<&'a str>,
}

/// Scans log lines for progress tokens and failure markers.
#[derive(Debug, Clone)]
pub struct ProgressExtractor {
    failure_markers: Vec<String>,
}

impl ProgressExtractor {
    /// Create an extractor with the given exact-substring failure markers.
    pub fn new(failure_markers: Vec<String>) -> Self {
        let failure_markers = failure_markers
            .into_iter()
            .filter(|m| !m.is_empty())
            .collect();
        Self { failure_markers }
    }

    /// Scan a line for both a progress token and a failure marker.
    pub fn scan<'a>(&'a self, line: &str) -> LineScan<'a> {
        LineScan {
            progress: extract_progress(line),
            failure: self.failure_marker(line),
        }
    }

    /// The first configured failure marker contained in the line.
    pub fn failure_marker(&self, line: &str) -> Option<&str> {
        self.failure_markers
            .iter()
            .find(|marker| line.contains(marker.as_str()))
            .map(String::as_str)
    }
}

impl Default for ProgressExtractor {
    fn default() -> Self {
        Self::new(vec![
            buildwatch_core::BUILD_STOPPED_MARKER.to_string(),
            buildwatch_core::FAILED_STEP_MARKER.to_string(),
        ])
    }
}

/// Find the first `[current/total]` token with a positive total.
///
/// Tokens with a zero total or numbers that overflow are skipped.
pub fn extract_progress(line: &str) -> Option<ProgressToken> {
    token_pattern().captures_iter(line).find_map(|caps| {
        let current = caps[1].parse::<u64>().ok()?;
        let total = caps[2].parse::<u64>().ok()?;
        (total > 0).then_some(ProgressToken { current, total })
    })
}

/// Remove progress tokens (and the whitespace after them) from a line.
pub fn strip_progress(line: &str) -> Cow<'_, str> {
    token_with_padding().replace_all(line, "")
}
