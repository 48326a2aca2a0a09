use thiserror::Error;

/// Reasons a detection run could not produce a trustworthy verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Non-finite sample at index {index} (time {time})")]
    NonFiniteSample { index: usize, time: f64 },

    #[error("Detection panicked: {0}")]
    Panicked(String),
}
