//! Completion time estimation.

use buildwatch_core::{Eta, Time};
use std::time::Duration;

/// Projects the time left from the remaining units and the current speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtaCalculator;

impl EtaCalculator {
    /// Units still to build, never negative.
    pub fn remaining(&self, current: u64, total: u64) -> u64 {
        total.saturating_sub(current)
    }

    /// Seconds until completion, or `None` while the speed is zero.
    pub fn eta_seconds(&self, current: u64, total: u64, speed: f64) -> Option<f64> {
        if !(speed.is_finite() && speed > 0.0) {
            return None;
        }
        Some(self.remaining(current, total) as f64 / speed)
    }

    /// Full projection anchored at `now`.
    ///
    /// Returns `None` when the speed is zero or the projection falls outside
    /// the representable time range.
    pub fn estimate(&self, current: u64, total: u64, speed: f64, now: Time) -> Option<Eta> {
        let seconds = self.eta_seconds(current, total, speed)?;
        let remaining = Duration::try_from_secs_f64(seconds).ok()?;
        let remaining = chrono::Duration::from_std(remaining).ok()?;
        let finish_at = now.checked_add_signed(remaining)?;
        Some(Eta { seconds, finish_at })
    }
}
