//! Application command handlers for micmeter.
//!
//! # Commands
//! - `meter`: live level meter (default)
//! - `list_devices`: list available audio input devices
//! - `config`: open the configuration file in the user's editor
//! - `logs`: display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod meter;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use meter::{handle_meter, MeterOptions};
