//! Progress estimation for a growing build log.
//!
//! Counters, windowed speed, ETA, phase, and stall/failure status, driven by
//! a single tick loop.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod eta;
pub mod extractor;
pub mod handler;
pub mod load;
pub mod phase;
pub mod speed;
pub mod stall;
pub mod state;

pub use engine::{control_channel, MonitorEngine, RunOutcome, TickOutcome};
pub use error::{MonitorError, Result};
pub use eta::EtaCalculator;
pub use extractor::{extract_progress, strip_progress, LineScan, ProgressExtractor, ProgressToken};
pub use handler::{event_channel, ChannelHandler, LoggingHandler, MonitorHandler, NoOpHandler};
pub use load::{FixedLoad, LoadError, LoadProbe, SharedLoad};
pub use phase::PhaseClassifier;
pub use speed::{ProgressSample, SpeedEstimator};
pub use stall::{StallAssessment, StallDetector, StallState, StallTransition};
pub use state::{ControlOutcome, LineUpdate, MonitorState, GRAPH_VERIFICATION_PHASE};
