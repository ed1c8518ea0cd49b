//! Sampling-to-metric core: level calculation, bounded history and threshold
//! evaluation.
//!
//! Everything in here is pure and hardware free. The acquisition session
//! drives these functions once per tick.

pub mod history;
pub mod level;
pub mod threshold;

pub use history::{HistoryBuffer, HistoryPoint};
pub use level::compute_level;
pub use threshold::{is_above_threshold, progress_width, Threshold};

/// Lower bound of the normalized decibel scale.
pub const DB_MIN: f32 = 0.0;
/// Upper bound of the normalized decibel scale.
pub const DB_MAX: f32 = 120.0;
/// Calibration offset added to dBFS so speech and music land mid-scale.
pub const DB_OFFSET: f32 = 90.0;
