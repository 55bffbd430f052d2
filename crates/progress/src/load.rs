//! Load signal seam.
//!
//! Sampling the OS is someone else's job; the engine only asks a probe for a
//! number once per tick.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Errors a probe can report. Never fatal to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No value has been published yet
    #[error("no load value available")]
    Missing,

    /// The underlying source failed
    #[error("load sampling failed: {0}")]
    Unavailable(String),
}

/// Source of the machine activity signal (e.g. one-minute load average).
#[async_trait]
pub trait LoadProbe: Send + Sync {
    /// Sample the current load.
    async fn sample(&self) -> Result<f64, LoadError>;
}

/// A probe that always reports the same load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLoad(pub f64);

#[async_trait]
impl LoadProbe for FixedLoad {
    async fn sample(&self) -> Result<f64, LoadError> {
        Ok(self.0)
    }
}

/// A load cell written by an external sampler task and read by the engine.
///
/// Clones share the same cell.
#[derive(Debug, Clone)]
pub struct SharedLoad {
    bits: Arc<AtomicU64>,
}

impl SharedLoad {
    /// Create an empty cell; sampling fails until a value is set.
    pub fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(f64::NAN.to_bits())),
        }
    }

    /// Publish a new load value.
    pub fn set(&self, load: f64) {
        self.bits.store(load.to_bits(), Ordering::Relaxed);
    }

    /// Mark the value as unknown.
    pub fn clear(&self) {
        self.bits.store(f64::NAN.to_bits(), Ordering::Relaxed);
    }

    /// Last published value, if any.
    pub fn get(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Relaxed));
        (!value.is_nan()).then_some(value)
    }
}

impl Default for SharedLoad {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoadProbe for SharedLoad {
    async fn sample(&self) -> Result<f64, LoadError> {
        self.get().ok_or(LoadError::Missing)
    }
}
