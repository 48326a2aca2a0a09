use serde::{Deserialize, Serialize};
use std::fmt;

/// One timestamped accelerometer reading (m/s²) plus its magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub absolute: f64,
}

impl Sample {
    /// Build a sample, deriving the magnitude from the three axes.
    pub fn new(time: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            time,
            x,
            y,
            z,
            absolute: magnitude(x, y, z),
        }
    }

    /// Build a sample with a sensor-reported magnitude.
    pub fn with_absolute(time: f64, x: f64, y: f64, z: f64, absolute: f64) -> Self {
        Self {
            time,
            x,
            y,
            z,
            absolute,
        }
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
            && self.absolute.is_finite()
    }
}

/// Euclidean norm; finite for any finite axes.
pub fn magnitude(x: f64, y: f64, z: f64) -> f64 {
    x.hypot(y).hypot(z)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Scan order; ties between axes resolve to the earlier entry.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(label)
    }
}
