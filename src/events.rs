use serde::{Deserialize, Serialize};

use crate::types::Axis;

/// Sustained drop in acceleration on one axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deceleration {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Most negative rate of change seen during the episode (m/s² per second).
    pub peak_value: f64,
    /// Axis that produced `peak_value`.
    pub axis: Axis,
}

/// Near-weightless interval while the device is in the air.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freefall {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub min_value: f64,
}

/// Single sample whose magnitude exceeded the impact threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    pub time: f64,
    pub peak_value: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PhaseEvent {
    Deceleration(Deceleration),
    Freefall(Freefall),
    Impact(Impact),
}

impl PhaseEvent {
    pub fn start_time(&self) -> f64 {
        match self {
            PhaseEvent::Deceleration(d) => d.start_time,
            PhaseEvent::Freefall(f) => f.start_time,
            PhaseEvent::Impact(i) => i.time,
        }
    }

    pub fn end_time(&self) -> f64 {
        match self {
            PhaseEvent::Deceleration(d) => d.end_time,
            PhaseEvent::Freefall(f) => f.end_time,
            PhaseEvent::Impact(i) => i.time,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            PhaseEvent::Deceleration(d) => d.duration,
            PhaseEvent::Freefall(f) => f.duration,
            PhaseEvent::Impact(_) => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PhaseEvent::Deceleration(_) => "deceleration",
            PhaseEvent::Freefall(_) => "freefall",
            PhaseEvent::Impact(_) => "impact",
        }
    }
}

/// Per-phase event lists produced by one detection run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvents {
    pub deceleration: Vec<Deceleration>,
    pub freefall: Vec<Freefall>,
    pub impact: Vec<Impact>,
}

impl PhaseEvents {
    pub fn is_empty(&self) -> bool {
        self.deceleration.is_empty() && self.freefall.is_empty() && self.impact.is_empty()
    }

    /// All events as one list, in deceleration, freefall, impact order.
    pub fn all(&self) -> Vec<PhaseEvent> {
        self.deceleration
            .iter()
            .cloned()
            .map(PhaseEvent::Deceleration)
            .chain(self.freefall.iter().cloned().map(PhaseEvent::Freefall))
            .chain(self.impact.iter().cloned().map(PhaseEvent::Impact))
            .collect()
    }
}

/// One causally ordered deceleration → free-fall → impact chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallSequence {
    pub deceleration: Deceleration,
    pub freefall: Freefall,
    pub impact: Impact,
    pub total_duration: f64,
}
