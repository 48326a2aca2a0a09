//! Fall detection orchestrator.
//!
//! Runs the phase detectors in strict mode and validates deceleration →
//! free-fall → impact sequences. When no sequence is found, falls back to
//! relaxed impacts confirmed by post-impact stillness, which catches
//! low-speed tip-overs.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::detectors::{detect_decelerations, detect_freefalls, detect_impacts, ImpactMode};
use crate::error::DetectionError;
use crate::events::{FallSequence, Impact, PhaseEvents};
use crate::samples::parse_samples;
use crate::sequence::validate_sequences;
use crate::stillness::{confirm_stillness, StillnessCheck};
use crate::thresholds::Thresholds;
use crate::types::{Axis, Sample};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    ThreePhase,
    ImpactOnly,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Summary {
    /// Earliest validated sequence.
    #[serde(rename_all = "camelCase")]
    ThreePhase {
        total_falls_detected: usize,
        first_fall_time: f64,
        first_fall_duration: f64,
        peak_impact_force: f64,
        peak_deceleration: f64,
        deceleration_axis: Axis,
        min_freefall_acceleration: f64,
        freefall_duration: f64,
    },
    /// Strongest impact followed by stillness.
    #[serde(rename_all = "camelCase")]
    ImpactOnly {
        impact_time: f64,
        peak_impact_force: f64,
        x: f64,
        y: f64,
        z: f64,
        confirmed_impacts: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub fall_detected: bool,
    pub mode: DetectionMode,
    pub thresholds: Thresholds,
    pub sample_count: usize,
    pub events: PhaseEvents,
    pub sequences: Vec<FallSequence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stillness_checks: Vec<StillnessCheck>,
    pub summary: Option<Summary>,
    /// Set when analysis failed and the verdict was degraded to "no fall".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn no_fall(thresholds: &Thresholds, sample_count: usize) -> Self {
        Self {
            fall_detected: false,
            mode: DetectionMode::ThreePhase,
            thresholds: thresholds.clone(),
            sample_count,
            events: PhaseEvents::default(),
            sequences: Vec::new(),
            stillness_checks: Vec::new(),
            summary: None,
            error: None,
        }
    }

    pub fn failed(thresholds: &Thresholds, sample_count: usize, error: &DetectionError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::no_fall(thresholds, sample_count)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// The validated sequence with the earliest deceleration.
    pub fn first_sequence(&self) -> Option<&FallSequence> {
        self.sequences
            .iter()
            .min_by(|a, b| a.deceleration.start_time.total_cmp(&b.deceleration.start_time))
    }
}

/// Stateless detector; one instance may serve concurrent callers.
#[derive(Clone, Debug, Default)]
pub struct FallDetector {
    thresholds: Thresholds,
}

impl FallDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Analyze samples, reporting why analysis could not be completed.
    pub fn try_detect(&self, samples: &[Sample]) -> Result<DetectionResult, DetectionError> {
        self.thresholds.validate()?;

        if let Some((index, sample)) = samples.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(DetectionError::NonFiniteSample {
                index,
                time: sample.time,
            });
        }

        panic::catch_unwind(AssertUnwindSafe(|| self.run(samples)))
            .map_err(|payload| DetectionError::Panicked(panic_message(payload.as_ref())))
    }

    pub fn try_detect_text(&self, raw: &str) -> Result<DetectionResult, DetectionError> {
        self.try_detect(&parse_samples(raw))
    }

    /// Fail-safe analysis: any failure yields a negative verdict with `error` set.
    pub fn detect(&self, samples: &[Sample]) -> DetectionResult {
        match self.try_detect(samples) {
            Ok(result) => result,
            Err(e) => {
                log::error!("An error occurred during fall detection: {}", e);
                DetectionResult::failed(&self.thresholds, samples.len(), &e)
            }
        }
    }

    pub fn detect_text(&self, raw: &str) -> DetectionResult {
        self.detect(&parse_samples(raw))
    }

    fn run(&self, samples: &[Sample]) -> DetectionResult {
        let t = &self.thresholds;

        if samples.is_empty() {
            log::info!("No valid data points found");
            return DetectionResult::no_fall(t, 0);
        }

        let events = PhaseEvents {
            deceleration: detect_decelerations(samples, t),
            freefall: detect_freefalls(samples, t),
            impact: detect_impacts(samples, t, ImpactMode::Strict),
        };
        log::debug!("Phase 1: Detected {} deceleration events", events.deceleration.len());
        log::debug!("Phase 2: Detected {} freefall events", events.freefall.len());
        log::debug!("Phase 3: Detected {} impact events", events.impact.len());

        let sequences = validate_sequences(&events.deceleration, &events.freefall, &events.impact, t);
        log::debug!("Validated {} three-phase falls", sequences.len());

        let mut result = DetectionResult {
            events,
            sequences,
            ..DetectionResult::no_fall(t, samples.len())
        };

        let three_phase = result.first_sequence().map(|first| Summary::ThreePhase {
            total_falls_detected: result.sequences.len(),
            first_fall_time: first.deceleration.start_time,
            first_fall_duration: first.total_duration,
            peak_impact_force: first.impact.peak_value,
            peak_deceleration: first.deceleration.peak_value,
            deceleration_axis: first.deceleration.axis,
            min_freefall_acceleration: first.freefall.min_value,
            freefall_duration: first.freefall.duration,
        });

        if three_phase.is_some() {
            result.summary = three_phase;
            result.fall_detected = true;
            log::info!("Fall detected: {} three-phase sequence(s)", result.sequences.len());
            return result;
        }

        let relaxed = detect_impacts(samples, t, ImpactMode::Relaxed);
        log::debug!("No three-phase fall, relaxed mode found {} impact(s)", relaxed.len());

        result.stillness_checks = relaxed
            .iter()
            .map(|impact| confirm_stillness(samples, impact, t))
            .collect();

        let confirmed: Vec<&Impact> = result
            .stillness_checks
            .iter()
            .filter(|check| check.still)
            .map(|check| &check.impact)
            .collect();

        let strongest = confirmed
            .iter()
            .copied()
            .reduce(|best, impact| if impact.peak_value > best.peak_value { impact } else { best });

        match strongest {
            Some(impact) => {
                log::info!(
                    "Impact-only fall detected (low-speed tip-over), max impact {:.2} m/s²",
                    impact.peak_value
                );
                result.summary = Some(Summary::ImpactOnly {
                    impact_time: impact.time,
                    peak_impact_force: impact.peak_value,
                    x: impact.x,
                    y: impact.y,
                    z: impact.z,
                    confirmed_impacts: confirmed.len(),
                });
                result.fall_detected = true;
                result.mode = DetectionMode::ImpactOnly;
            }
            None if relaxed.is_empty() => {
                log::info!("No fall detected: no impacts above {} m/s²", t.impact);
            }
            None => {
                log::info!("No fall detected: no impact followed by stillness (rough road or aggressive maneuver)");
            }
        }

        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
