use serde::{Deserialize, Serialize};

use crate::events::Impact;
use crate::thresholds::Thresholds;
use crate::types::Sample;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactMode {
    /// Threshold exceedance that is also a strict local maximum.
    Strict,
    /// Any threshold exceedance; catches broad, low-speed tip-over impacts.
    Relaxed,
}

/// Find samples whose magnitude exceeds the impact threshold.
pub fn detect_impacts(samples: &[Sample], thresholds: &Thresholds, mode: ImpactMode) -> Vec<Impact> {
    let values: Vec<f64> = samples.iter().map(|s| s.absolute).collect();

    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.absolute > thresholds.impact)
        .filter(|(i, _)| match mode {
            ImpactMode::Strict => is_local_peak(&values, *i, thresholds.impact, thresholds.lookback),
            ImpactMode::Relaxed => true,
        })
        .map(|(_, s)| Impact {
            time: s.time,
            peak_value: s.absolute,
            x: s.x,
            y: s.y,
            z: s.z,
        })
        .collect()
}

/// True when `values[index]` reaches `threshold` and every neighbour within
/// `lookback` positions on both sides is strictly smaller.
///
/// Candidates without `lookback` neighbours on each side never qualify.
pub fn is_local_peak(values: &[f64], index: usize, threshold: f64, lookback: usize) -> bool {
    if index < lookback || index + lookback >= values.len() {
        return false;
    }

    let candidate = values[index];
    if candidate < threshold {
        return false;
    }

    (1..=lookback).all(|offset| values[index - offset] < candidate && values[index + offset] < candidate)
}
