//! micmeter: a real-time microphone level meter for the terminal.
//!
//! The core (`meter`, `session`, `audio`) is usable without the terminal
//! front end: a session samples one input device once per redraw and keeps
//! the normalized reading, the spectrum and a bounded loudness history.

pub mod app;
pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod meter;
pub mod session;
pub mod ui;

pub use error::{MeterError, Result};
