use serde::{Deserialize, Serialize};

use crate::events::Impact;
use crate::stats::WindowStats;
use crate::thresholds::Thresholds;
use crate::types::Sample;

/// Outcome of checking whether the device settled after an impact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StillnessCheck {
    pub impact: Impact,
    pub window_start: f64,
    pub window_end: f64,
    pub sample_count: usize,
    pub mean: f64,
    pub variance: f64,
    pub still: bool,
}

/// Check for post-impact stillness.
///
/// After a sliding grace period the magnitude must settle below the stillness
/// mean with low variance, over at least `min_stillness_samples` samples. A
/// device resting at an angle reads under 1 g; rough roads and aggressive
/// riding keep the variance or mean high.
pub fn confirm_stillness(samples: &[Sample], impact: &Impact, thresholds: &Thresholds) -> StillnessCheck {
    let window_start = impact.time + thresholds.sliding_window;
    let window_end = window_start + thresholds.stillness_window;

    let stats = WindowStats::from_values(
        samples
            .iter()
            .filter(|s| s.time >= window_start && s.time <= window_end)
            .map(|s| s.absolute),
    );

    let still = stats.count >= thresholds.min_stillness_samples
        && stats.mean < thresholds.stillness_mean
        && stats.variance < thresholds.stillness_variance;

    if stats.count < thresholds.min_stillness_samples {
        log::debug!(
            "Stillness check for impact at {:.2}s: not enough data ({} samples after {:.2}s)",
            impact.time,
            stats.count,
            window_start
        );
    } else {
        log::debug!(
            "Stillness check for impact at {:.2}s: avg={:.2} m/s², variance={:.2}, still={}",
            impact.time,
            stats.mean,
            stats.variance,
            still
        );
    }

    StillnessCheck {
        impact: impact.clone(),
        window_start,
        window_end,
        sample_count: stats.count,
        mean: stats.mean,
        variance: stats.variance,
        still,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.02;

    fn impact_at(time: f64) -> Impact {
        Impact {
            time,
            peak_value: 16.0,
            x: 0.0,
            y: 0.0,
            z: 16.0,
        }
    }

    /// 50 Hz samples from 0 to `duration` with magnitude given by `f(time)`.
    fn trace(duration: f64, f: impl Fn(f64, usize) -> f64) -> Vec<Sample> {
        let count = (duration / DT).round() as usize;
        (0..=count)
            .map(|k| {
                let t = k as f64 * DT;
                let a = f(t, k);
                Sample::with_absolute(t, 0.0, 0.0, a, a)
            })
            .collect()
    }

    #[test]
    fn test_settled_below_gravity_is_still() {
        // alternating 8.5 / 9.5: mean 9.0, variance 0.25
        let samples = trace(6.0, |t, k| {
            if t < 3.0 {
                9.81
            } else if k % 2 == 0 {
                8.5
            } else {
                9.5
            }
        });
        let check = confirm_stillness(&samples, &impact_at(1.0), &Thresholds::default());

        assert!(check.sample_count >= 10);
        assert!((check.mean - 9.0).abs() < 0.1);
        assert!(check.still);
    }

    #[test]
    fn test_flat_on_gravity_is_not_still() {
        let samples = trace(6.0, |_, _| 9.81);
        let check = confirm_stillness(&samples, &impact_at(1.0), &Thresholds::default());
        assert!(!check.still);
    }

    #[test]
    fn test_high_variance_rejected() {
        let samples = trace(6.0, |_, k| if k % 2 == 0 { 6.0 } else { 11.0 });
        let check = confirm_stillness(&samples, &impact_at(1.0), &Thresholds::default());

        assert!(check.mean < 9.5);
        assert!(check.variance > 1.5);
        assert!(!check.still);
    }

    #[test]
    fn test_insufficient_trailing_samples() {
        // Recording ends 0.1 s into the observation window
        let samples = trace(3.1, |_, _| 9.0);
        let check = confirm_stillness(&samples, &impact_at(1.0), &Thresholds::default());

        assert!(check.sample_count < 10);
        assert!(!check.still);
    }

    /// Exactly ten samples inside [3.0, 4.5] for an impact at 1.0, two of
    /// them on the window ends, plus neighbours just outside.
    fn ten_in_window() -> Vec<Sample> {
        [
            2.875, 3.0, 3.125, 3.25, 3.375, 3.5, 3.625, 3.75, 4.0, 4.25, 4.5, 4.625,
        ]
        .iter()
        .map(|&t| Sample::with_absolute(t, 0.0, 0.0, 9.0, 9.0))
        .collect()
    }

    #[test]
    fn test_exactly_min_samples_accepted() {
        let check = confirm_stillness(&ten_in_window(), &impact_at(1.0), &Thresholds::default());
        assert_eq!(check.sample_count, 10);
        assert!(check.still);
    }

    #[test]
    fn test_window_ends_are_inclusive() {
        let thresholds = Thresholds::default();

        let without_start: Vec<Sample> = ten_in_window().into_iter().filter(|s| s.time != 3.0).collect();
        let check = confirm_stillness(&without_start, &impact_at(1.0), &thresholds);
        assert_eq!(check.sample_count, 9);
        assert!(!check.still);

        let without_end: Vec<Sample> = ten_in_window().into_iter().filter(|s| s.time != 4.5).collect();
        let check = confirm_stillness(&without_end, &impact_at(1.0), &thresholds);
        assert_eq!(check.sample_count, 9);
        assert!(!check.still);
    }

    #[test]
    fn test_window_bounds() {
        let samples = trace(6.0, |_, _| 9.0);
        let check = confirm_stillness(&samples, &impact_at(1.0), &Thresholds::default());

        assert!((check.window_start - 3.0).abs() < 1e-12);
        assert!((check.window_end - 4.5).abs() < 1e-12);
        assert!(check.still);
    }
}
