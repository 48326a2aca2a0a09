use crate::events::Deceleration;
use crate::thresholds::Thresholds;
use crate::types::{Axis, Sample};

struct OpenEpisode {
    start_time: f64,
    peak_value: f64,
    axis: Axis,
}

/// Find sustained decelerations.
///
/// For every consecutive pair the per-axis rate of change is computed and the
/// most negative axis drives the episode state. Pairs with identical
/// timestamps are skipped. Episodes shorter than the minimum event duration
/// are discarded as noise.
pub fn detect_decelerations(samples: &[Sample], thresholds: &Thresholds) -> Vec<Deceleration> {
    let mut events = Vec::new();
    let mut open: Option<OpenEpisode> = None;

    for pair in samples.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let dt = current.time - previous.time;
        if dt == 0.0 {
            continue;
        }

        let (axis, rate) = steepest_drop(previous, current, dt);

        if rate < thresholds.deceleration {
            if let Some(episode) = open.as_mut() {
                if rate < episode.peak_value {
                    episode.peak_value = rate;
                    episode.axis = axis;
                }
            } else {
                open = Some(OpenEpisode {
                    start_time: current.time,
                    peak_value: rate,
                    axis,
                });
            }
        } else if let Some(episode) = open.take() {
            close_episode(&mut events, episode, current.time, thresholds);
        }
    }

    // Still decelerating when the recording ends
    if let (Some(episode), Some(last)) = (open.take(), samples.last()) {
        close_episode(&mut events, episode, last.time, thresholds);
    }

    events
}

fn steepest_drop(previous: &Sample, current: &Sample, dt: f64) -> (Axis, f64) {
    let rate_of = |axis: Axis| (current.axis(axis) - previous.axis(axis)) / dt;

    let mut steepest = (Axis::X, rate_of(Axis::X));
    for axis in [Axis::Y, Axis::Z] {
        let rate = rate_of(axis);
        if rate < steepest.1 {
            steepest = (axis, rate);
        }
    }
    steepest
}

fn close_episode(
    events: &mut Vec<Deceleration>,
    episode: OpenEpisode,
    end_time: f64,
    thresholds: &Thresholds,
) {
    if thresholds.meets_minimum_duration(episode.start_time, end_time) {
        events.push(Deceleration {
            start_time: episode.start_time,
            end_time,
            duration: end_time - episode.start_time,
            peak_value: episode.peak_value,
            axis: episode.axis,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.02;

    /// 50 Hz samples built from a per-index (x, y, z) generator.
    fn series(count: usize, f: impl Fn(usize) -> (f64, f64, f64)) -> Vec<Sample> {
        (0..count)
            .map(|k| {
                let (x, y, z) = f(k);
                Sample::new(k as f64 * DT, x, y, z)
            })
            .collect()
    }

    /// y falls by 0.5 per sample (-25 m/s² per second) over `steps` samples starting at index 50.
    fn y_drop(steps: usize) -> impl Fn(usize) -> (f64, f64, f64) {
        move |k| {
            let y = if k <= 50 {
                0.0
            } else if k <= 50 + steps {
                -0.5 * (k - 50) as f64
            } else {
                -0.5 * steps as f64
            };
            (0.0, y, 9.81)
        }
    }

    #[test]
    fn test_constant_signal_has_no_deceleration() {
        let samples = series(250, |_| (0.0, 0.0, 9.81));
        assert!(detect_decelerations(&samples, &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_sustained_drop_emits_one_event() {
        let samples = series(150, y_drop(15));
        let events = detect_decelerations(&samples, &Thresholds::default());

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.axis, Axis::Y);
        assert_relative_eq!(event.start_time, 51.0 * DT, epsilon = 1e-9);
        assert_relative_eq!(event.end_time, 66.0 * DT, epsilon = 1e-9);
        assert_relative_eq!(event.duration, 0.3, epsilon = 1e-9);
        assert_relative_eq!(event.peak_value, -25.0, epsilon = 1e-6);
        assert!(event.duration >= Thresholds::default().min_event_duration);
    }

    #[test]
    fn test_short_drop_is_noise() {
        // 5 samples = 0.1 s, below the 0.2 s floor
        let samples = series(150, y_drop(5));
        assert!(detect_decelerations(&samples, &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_open_episode_flushed_at_end_of_stream() {
        let samples = series(80, |k| {
            let x = if k <= 50 { 0.0 } else { -0.5 * (k - 50) as f64 };
            (x, 0.0, 9.81)
        });
        let events = detect_decelerations(&samples, &Thresholds::default());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::X);
        assert_relative_eq!(events[0].end_time, 79.0 * DT, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_follows_most_extreme_rate() {
        // x drops at -20/s for the whole episode, z briefly drops at -40/s
        let samples = series(120, |k| {
            let x = if k <= 50 { 0.0 } else { -0.4 * (k.min(70) - 50) as f64 };
            let z = if k < 60 {
                9.81
            } else if k < 62 {
                9.81 - 0.8 * (k - 59) as f64
            } else {
                9.81 - 1.6
            };
            (x, 0.0, z)
        });
        let events = detect_decelerations(&samples, &Thresholds::default());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::Z);
        assert_relative_eq!(events[0].peak_value, -40.0, epsilon = 1e-6);
    }

    #[test]
    fn test_simultaneous_axes_merge_into_one_episode() {
        let samples = series(150, |k| {
            let drop = if k <= 50 { 0.0 } else { -0.5 * (k.min(65) - 50) as f64 };
            (drop, drop, 9.81 + drop)
        });
        let events = detect_decelerations(&samples, &Thresholds::default());
        assert_eq!(events.len(), 1);
    }

    /// Samples 0.25 s apart with y stepping down by `step` from index 4 to 8.
    /// Both values are exact in binary, so the rate is exactly `-step * 4`.
    fn quarter_second_drop(step: f64) -> Vec<Sample> {
        (0..12)
            .map(|k| {
                let y = -step * (k.clamp(4, 8) - 4) as f64;
                Sample::new(k as f64 * 0.25, 0.0, y, 9.81)
            })
            .collect()
    }

    #[test]
    fn test_rate_exactly_at_threshold_does_not_open() {
        let t = Thresholds::default();
        assert!(detect_decelerations(&quarter_second_drop(3.75), &t).is_empty());

        let events = detect_decelerations(&quarter_second_drop(4.0), &t);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].peak_value, -16.0);
        assert_eq!(events[0].start_time, 1.25);
        assert_eq!(events[0].end_time, 2.25);
    }

    #[test]
    fn test_axis_ties_resolve_in_xyz_order() {
        let ramp = |k: usize| if k <= 50 { 0.0 } else { -0.5 * (k.min(65) - 50) as f64 };

        let xy = series(150, |k| (ramp(k), ramp(k), 9.81));
        let events = detect_decelerations(&xy, &Thresholds::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::X);

        let yz = series(150, |k| (0.0, ramp(k), ramp(k)));
        let events = detect_decelerations(&yz, &Thresholds::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].axis, Axis::Y);
    }

    #[test]
    fn test_duplicate_timestamps_are_skipped() {
        let mut samples = series(150, y_drop(15));
        let dup = samples[55];
        samples.insert(56, dup);
        let events = detect_decelerations(&samples, &Thresholds::default());

        assert_eq!(events.len(), 1);
        assert!(events[0].peak_value.is_finite());
    }

    #[test]
    fn test_empty_and_single_sample() {
        let t = Thresholds::default();
        assert!(detect_decelerations(&[], &t).is_empty());
        assert!(detect_decelerations(&[Sample::new(0.0, 0.0, 0.0, 9.81)], &t).is_empty());
    }
}
