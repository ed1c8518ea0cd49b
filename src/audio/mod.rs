//! Audio input: device directory, cpal capture and the analysis node.
//!
//! The session only sees the traits defined here, so the state machine can be
//! driven by a scripted backend in tests and by cpal in the application.

pub mod analyser;
pub mod capture;
pub mod devices;
mod stderr;

pub use analyser::Analyser;
pub use capture::{CpalBackend, CpalConnection};
pub use devices::{format_device_label, resolve_device, CpalDirectory};

use crate::error::Result;

/// Analysis window used when the configuration does not override it.
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
/// Smoothing time constant applied by the analysis node to spectrum magnitudes.
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Input processing the platform could apply before samples reach the meter.
///
/// The meter reports the raw level, so every option is requested off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl InputConstraints {
    /// Unprocessed input.
    pub const fn raw() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

/// Parameters for opening an input connection and its analysis node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// Samples per analysed frame
    pub window_size: usize,
    /// Spectrum smoothing time constant in [0, 1)
    pub smoothing: f32,
    pub constraints: InputConstraints,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            constraints: InputConstraints::raw(),
        }
    }
}

/// One tick's worth of analysis output.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    /// Time-domain samples in [-1, 1], `window_size` long
    pub samples: Vec<f32>,
    /// Byte spectrum, `window_size / 2` bins in 0-255
    pub frequency: Vec<u8>,
}

/// An input device as presented to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    /// Opaque id handed back to [`AudioBackend::open`]
    pub id: String,
    /// Display label
    pub label: String,
    pub is_default: bool,
}

/// Enumerates input devices and performs the access handshake.
#[allow(async_fn_in_trait)]
pub trait DeviceDirectory {
    fn list_input_devices(&self) -> Result<Vec<InputDevice>>;

    /// Confirms the device exists and may be opened. May wait on the platform.
    async fn request_access(&self, device_id: &str) -> Result<()>;
}

/// Opens exclusive input connections.
pub trait AudioBackend: DeviceDirectory {
    type Connection: InputConnection;

    fn open(&self, device_id: &str, settings: &CaptureSettings) -> Result<Self::Connection>;
}

/// A live input stream with its analysis node.
pub trait InputConnection {
    /// Reads the most recent window of audio and its spectrum.
    fn read_frame(&mut self) -> Result<AnalysisFrame>;

    /// Disconnects the stream and releases the device. Safe to call twice.
    fn close(&mut self);
}
