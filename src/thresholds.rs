//! Detection thresholds.
//!
//! Accelerations are in m/s², rates in m/s² per second, times in seconds.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Standard gravity, used to express forces in g for alerts.
pub const GRAVITY: f64 = 9.81;

pub const DECELERATION_THRESHOLD: f64 = -15.0;
pub const FREEFALL_THRESHOLD: f64 = 2.0;
pub const IMPACT_THRESHOLD: f64 = 14.22;
pub const MAX_TIME_BETWEEN_PHASES: f64 = 2.0;
pub const MIN_EVENT_DURATION: f64 = 0.2;
pub const SLIDING_WINDOW: f64 = 2.0;
pub const STILLNESS_WINDOW: f64 = 1.5;
pub const STILLNESS_THRESHOLD: f64 = 9.5;
pub const STILLNESS_VARIANCE_THRESHOLD: f64 = 1.5;
pub const LOOKBACK: usize = 2;
pub const MIN_STILLNESS_SAMPLES: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Thresholds {
    /// Per-axis rate of change below which a deceleration episode is open.
    pub deceleration: f64,
    /// Absolute acceleration below which the device is considered falling.
    pub freefall: f64,
    /// Absolute acceleration above which a sample counts as an impact.
    pub impact: f64,
    pub max_time_between_phases: f64,
    pub min_event_duration: f64,
    /// Grace period after an impact before stillness is measured.
    pub sliding_window: f64,
    pub stillness_window: f64,
    pub stillness_mean: f64,
    pub stillness_variance: f64,
    /// Neighbours required on each side of a strict impact peak.
    pub lookback: usize,
    pub min_stillness_samples: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            deceleration: DECELERATION_THRESHOLD,
            freefall: FREEFALL_THRESHOLD,
            impact: IMPACT_THRESHOLD,
            max_time_between_phases: MAX_TIME_BETWEEN_PHASES,
            min_event_duration: MIN_EVENT_DURATION,
            sliding_window: SLIDING_WINDOW,
            stillness_window: STILLNESS_WINDOW,
            stillness_mean: STILLNESS_THRESHOLD,
            stillness_variance: STILLNESS_VARIANCE_THRESHOLD,
            lookback: LOOKBACK,
            min_stillness_samples: MIN_STILLNESS_SAMPLES,
        }
    }
}

impl Thresholds {
    /// Load overrides from a JSON file. Keys that are absent keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read thresholds file {}", path.display()))?;
        let thresholds: Thresholds = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse thresholds file {}", path.display()))?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        let values = [
            ("deceleration", self.deceleration),
            ("freefall", self.freefall),
            ("impact", self.impact),
            ("maxTimeBetweenPhases", self.max_time_between_phases),
            ("minEventDuration", self.min_event_duration),
            ("slidingWindow", self.sliding_window),
            ("stillnessWindow", self.stillness_window),
            ("stillnessMean", self.stillness_mean),
            ("stillnessVariance", self.stillness_variance),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(DetectionError::InvalidThresholds(format!(
                "{} must be finite",
                name
            )));
        }

        if self.min_event_duration < 0.0 {
            return Err(DetectionError::InvalidThresholds(
                "minEventDuration must not be negative".to_string(),
            ));
        }
        if self.max_time_between_phases < 0.0 || self.sliding_window < 0.0 {
            return Err(DetectionError::InvalidThresholds(
                "time windows must not be negative".to_string(),
            ));
        }
        if self.stillness_window <= 0.0 {
            return Err(DetectionError::InvalidThresholds(
                "stillnessWindow must be positive".to_string(),
            ));
        }
        if self.lookback == 0 {
            return Err(DetectionError::InvalidThresholds(
                "lookback must be at least 1".to_string(),
            ));
        }
        if self.min_stillness_samples == 0 {
            return Err(DetectionError::InvalidThresholds(
                "minStillnessSamples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an episode spanning `start..=end` is long enough to count.
    pub fn meets_minimum_duration(&self, start: f64, end: f64) -> bool {
        end - start >= self.min_event_duration
    }

    /// Whether two phase boundaries are close enough to belong to one fall.
    pub fn within_phase_window(&self, first: f64, second: f64) -> bool {
        (second - first).abs() <= self.max_time_between_phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let t = Thresholds::default();
        assert!(t.validate().is_ok());
        assert_eq!(t.deceleration, -15.0);
        assert_eq!(t.impact, 14.22);
        assert_eq!(t.lookback, 2);
    }

    #[test]
    fn test_rejects_zero_lookback() {
        let t = Thresholds {
            lookback: 0,
            ..Thresholds::default()
        };
        assert!(matches!(
            t.validate(),
            Err(DetectionError::InvalidThresholds(_))
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let t = Thresholds {
            impact: f64::NAN,
            ..Thresholds::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_phase_window_is_symmetric() {
        let t = Thresholds::default();
        assert!(t.within_phase_window(1.0, 3.0));
        assert!(t.within_phase_window(3.0, 1.0));
        assert!(!t.within_phase_window(1.0, 3.5));
    }

    #[test]
    fn test_partial_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"impact\": 20.0, \"lookback\": 3}}").unwrap();
        let t = Thresholds::from_json_file(file.path()).unwrap();
        assert_eq!(t.impact, 20.0);
        assert_eq!(t.lookback, 3);
        assert_eq!(t.freefall, FREEFALL_THRESHOLD);
    }

    #[test]
    fn test_invalid_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"stillnessWindow\": 0.0}}").unwrap();
        assert!(Thresholds::from_json_file(file.path()).is_err());
    }
}
