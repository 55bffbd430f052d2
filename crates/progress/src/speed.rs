//! Sliding-window throughput estimation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Cumulative completed-unit count observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// When the count was observed
    pub timestamp: Instant,
    /// Completed units at that time
    pub count: u64,
}

/// Computes units per second over a time-bounded window of samples.
///
/// The rate is taken between the oldest and newest sample in the window,
/// which damps bursty log flushes without lagging a full session behind.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    window: Duration,
    min_span: Duration,
    samples: VecDeque<ProgressSample>,
    speed: f64,
}

impl SpeedEstimator {
    /// Create an estimator with the given window and minimum time span.
    pub fn new(window: Duration, min_span: Duration) -> Self {
        Self {
            window,
            min_span,
            samples: VecDeque::new(),
            speed: 0.0,
        }
    }

    /// Append a sample, prune the window and return the updated speed.
    pub fn record(&mut self, timestamp: Instant, count: u64) -> f64 {
        self.samples.push_back(ProgressSample { timestamp, count });
        self.prune(timestamp);
        self.speed = self.compute();
        self.speed
    }

    /// Drop samples older than the window from the front, keeping at least two.
    fn prune(&mut self, newest: Instant) {
        while self.samples.len() > 2 {
            let Some(oldest) = self.samples.front() else {
                break;
            };
            if newest.saturating_duration_since(oldest.timestamp) <= self.window {
                break;
            }
            self.samples.pop_front();
        }
    }

    fn compute(&self) -> f64 {
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }

        let span = newest.timestamp.saturating_duration_since(oldest.timestamp);
        if span <= self.min_span {
            return 0.0;
        }

        let delta = newest.count as f64 - oldest.count as f64;
        (delta / span.as_secs_f64()).max(0.0)
    }

    /// Last computed speed in units per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Samples currently in the window, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &ProgressSample> {
        self.samples.iter()
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forget every sample.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.speed = 0.0;
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(1))
    }
}
