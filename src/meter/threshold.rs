//! Alert threshold and display progress mapping.

use super::{DB_MAX, DB_MIN};

/// Strictly above: a level equal to the threshold does not alert.
pub fn is_above_threshold(level: f32, threshold: f32) -> bool {
    level > threshold
}

/// Maps a level onto a 0-100 progress width. Display scaling only.
pub fn progress_width(level: f32) -> f32 {
    (level / DB_MAX * 100.0).clamp(0.0, 100.0)
}

/// Operator-set alert level, always kept inside the decibel scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Self {
        Self(clamp_db(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn set(&mut self, value: f32) {
        self.0 = clamp_db(value);
    }

    /// Shifts the threshold by `delta` dB, saturating at the scale ends.
    pub fn adjust(&mut self, delta: f32) {
        self.set(self.0 + delta);
    }

    pub fn is_exceeded_by(self, level: f32) -> bool {
        is_above_threshold(level, self.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(75.0)
    }
}

fn clamp_db(value: f32) -> f32 {
    if value.is_nan() {
        return DB_MIN;
    }
    value.clamp(DB_MIN, DB_MAX)
}
