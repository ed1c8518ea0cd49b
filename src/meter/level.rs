//! RMS to normalized decibel conversion.

use super::{DB_MAX, DB_MIN, DB_OFFSET};

/// RMS floor so silence maps to a finite dBFS value instead of -inf.
const RMS_FLOOR: f64 = 1e-6;

/// Computes the normalized decibel reading for one sample frame.
///
/// `rms = sqrt(mean(x²))`, `db = 20·log10(max(rms, 1e-6)) + 90`, clamped to
/// `[0, 120]` and rounded to one decimal. The frame must not be empty.
pub fn compute_level(frame: &[f32]) -> f32 {
    debug_assert!(!frame.is_empty(), "sample frames are never empty");

    let normalized = rms_to_decibels(rms(frame));
    round_to_tenth(normalized)
}

/// Root-mean-square of the frame, accumulated in f64.
pub fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_of_squares / frame.len() as f64).sqrt()
}

/// Converts a linear RMS value to the normalized 0-120 scale, unrounded.
pub fn rms_to_decibels(rms: f64) -> f32 {
    let db_fs = 20.0 * rms.max(RMS_FLOOR).log10();
    (db_fs as f32 + DB_OFFSET).clamp(DB_MIN, DB_MAX)
}

fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
