//! Three-phase fall detection for motorcycle accelerometer recordings.
//!
//! A fall is a deceleration, then free-fall, then impact, in that order and
//! close together in time. Low-speed tip-overs that skip the first two phases
//! are caught by an impact followed by the device lying still.

pub mod config;
pub mod detector;
pub mod detectors;
pub mod error;
pub mod events;
pub mod notify;
pub mod samples;
pub mod sequence;
pub mod server;
pub mod service;
pub mod stats;
pub mod stillness;
pub mod store;
pub mod thresholds;
pub mod types;

pub use detector::{DetectionMode, DetectionResult, FallDetector, Summary};
pub use error::DetectionError;
pub use events::{Deceleration, FallSequence, Freefall, Impact, PhaseEvent, PhaseEvents};
pub use samples::parse_samples;
pub use service::FallDetectionService;
pub use thresholds::Thresholds;
pub use types::{Axis, Sample};
