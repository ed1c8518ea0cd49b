//! Terminal presentation: the live meter screen and the fatal error screen.

pub mod error;
pub mod meter;
pub mod theme;

pub use error::ErrorScreen;
pub use meter::{MeterCommand, MeterTui, MeterView};
