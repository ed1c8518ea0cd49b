//! Configuration management for micmeter.
//!
//! Settings live in a TOML file in the user's config directory. A missing
//! file is created from defaults on first run.

pub mod file;

pub use file::{config_path, AudioConfig, ColorMode, MeterConfig, MeterSettings};
