use crate::events::{Deceleration, FallSequence, Freefall, Impact};
use crate::thresholds::Thresholds;

/// Assemble every deceleration → free-fall → impact chain whose phases are in
/// time order and whose consecutive phases lie within the cross-phase window.
///
/// All matching triples are returned, ordered by deceleration, then free-fall,
/// then impact. Overlapping triples are not deduplicated.
pub fn validate_sequences(
    decelerations: &[Deceleration],
    freefalls: &[Freefall],
    impacts: &[Impact],
    thresholds: &Thresholds,
) -> Vec<FallSequence> {
    let mut sequences = Vec::new();

    for deceleration in decelerations {
        let following_freefalls = freefalls.iter().filter(|ff| {
            ff.start_time >= deceleration.start_time
                && thresholds.within_phase_window(deceleration.end_time, ff.start_time)
        });

        for freefall in following_freefalls {
            let following_impacts = impacts.iter().filter(|imp| {
                imp.time >= freefall.start_time
                    && thresholds.within_phase_window(freefall.end_time, imp.time)
            });

            for impact in following_impacts {
                sequences.push(FallSequence {
                    deceleration: deceleration.clone(),
                    freefall: freefall.clone(),
                    impact: impact.clone(),
                    total_duration: impact.time - deceleration.start_time,
                });
            }
        }
    }

    sequences
}
