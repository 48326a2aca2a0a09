use crate::events::Freefall;
use crate::thresholds::Thresholds;
use crate::types::Sample;

/// Find near-weightless intervals where the magnitude stays below the
/// free-fall threshold for at least the minimum event duration.
pub fn detect_freefalls(samples: &[Sample], thresholds: &Thresholds) -> Vec<Freefall> {
    let mut events = Vec::new();
    // (start_time, min_value)
    let mut open: Option<(f64, f64)> = None;

    for sample in samples {
        if sample.absolute < thresholds.freefall {
            match open.as_mut() {
                Some((_, min_value)) => *min_value = min_value.min(sample.absolute),
                None => open = Some((sample.time, sample.absolute)),
            }
        } else if let Some((start_time, min_value)) = open.take() {
            close_episode(&mut events, start_time, sample.time, min_value, thresholds);
        }
    }

    if let (Some((start_time, min_value)), Some(last)) = (open.take(), samples.last()) {
        close_episode(&mut events, start_time, last.time, min_value, thresholds);
    }

    events
}

fn close_episode(
    events: &mut Vec<Freefall>,
    start_time: f64,
    end_time: f64,
    min_value: f64,
    thresholds: &Thresholds,
) {
    if thresholds.meets_minimum_duration(start_time, end_time) {
        events.push(Freefall {
            start_time,
            end_time,
            duration: end_time - start_time,
            min_value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.02;

    fn magnitudes(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(k, &a)| Sample::with_absolute(k as f64 * DT, 0.0, 0.0, a, a))
            .collect()
    }

    fn with_dip(len: usize, from: usize, to: usize, level: f64) -> Vec<f64> {
        (0..len)
            .map(|k| if k >= from && k < to { level } else { 9.81 })
            .collect()
    }

    #[test]
    fn test_gravity_only() {
        let samples = magnitudes(&[9.81; 100]);
        assert!(detect_freefalls(&samples, &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_sustained_dip_is_freefall() {
        let mut values = with_dip(100, 40, 55, 0.8);
        values[47] = 0.3;
        let events = detect_freefalls(&magnitudes(&values), &Thresholds::default());

        assert_eq!(events.len(), 1);
        assert_relative_eq!(events[0].start_time, 40.0 * DT, epsilon = 1e-9);
        assert_relative_eq!(events[0].end_time, 55.0 * DT, epsilon = 1e-9);
        assert_relative_eq!(events[0].duration, 0.3, epsilon = 1e-9);
        assert_eq!(events[0].min_value, 0.3);
    }

    #[test]
    fn test_brief_dip_is_ignored() {
        let values = with_dip(100, 40, 45, 0.5);
        assert!(detect_freefalls(&magnitudes(&values), &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_two_separate_episodes() {
        let mut values = with_dip(200, 20, 35, 1.0);
        for v in values.iter_mut().skip(120).take(20) {
            *v = 1.5;
        }
        let events = detect_freefalls(&magnitudes(&values), &Thresholds::default());

        assert_eq!(events.len(), 2);
        assert!(events[0].end_time < events[1].start_time);
        assert_eq!(events[1].min_value, 1.5);
    }

    #[test]
    fn test_flushed_at_end_of_stream() {
        let values = with_dip(60, 40, 60, 0.2);
        let events = detect_freefalls(&magnitudes(&values), &Thresholds::default());

        assert_eq!(events.len(), 1);
        assert_relative_eq!(events[0].end_time, 59.0 * DT, epsilon = 1e-9);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let values = with_dip(100, 40, 60, 2.0);
        assert!(detect_freefalls(&magnitudes(&values), &Thresholds::default()).is_empty());
    }
}
