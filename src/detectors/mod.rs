//! Phase detectors
//!
//! Each detector is a single pass over the samples that collapses contiguous
//! runs satisfying a threshold condition into typed events.

pub mod deceleration;
pub mod freefall;
pub mod impact;

pub use deceleration::detect_decelerations;
pub use freefall::detect_freefalls;
pub use impact::{detect_impacts, is_local_peak, ImpactMode};
