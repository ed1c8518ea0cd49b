//! Classified errors for device access and acquisition.
//!
//! Every variant renders as a message fit to show the operator directly. Raw
//! platform errors never leave the audio layer unclassified.

/// Result alias for the meter core.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Failure kinds surfaced by the device directory and the acquisition session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeterError {
    /// Device listing failed (permissions or missing platform API).
    #[error("Failed to enumerate audio devices. Please check your audio permissions. ({0})")]
    DeviceEnumerationFailed(String),
    /// The operator refused or revoked access to the input device.
    #[error("Microphone access denied. Please grant permission to use the microphone.")]
    AccessDenied,
    /// The requested device id does not exist (anymore).
    #[error("No microphone found. Please connect a microphone device. (requested: {0})")]
    DeviceNotFound(String),
    /// Stream or analysis context construction failed for any other reason.
    #[error("Failed to start recording. Please ensure your microphone is working correctly. ({0})")]
    AcquisitionFailed(String),
    /// The live input stream broke while sampling, e.g. the device was unplugged.
    #[error("The microphone stopped delivering audio: {0}")]
    DeviceLost(String),
}

/// Which kind a platform failure falls back to when its message is not specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Enumeration,
    Acquisition,
}

/// Maps a raw backend message onto a [`MeterError`].
///
/// Permission wording wins over device wording; anything else becomes the
/// fallback kind carrying the original message.
pub fn classify_backend_error(message: &str, fallback: ErrorKind, device_id: &str) -> MeterError {
    let lower = message.to_lowercase();

    if lower.contains("permission") || lower.contains("denied") {
        return MeterError::AccessDenied;
    }
    if lower.contains("not found")
        || lower.contains("no such device")
        || lower.contains("not available")
    {
        return MeterError::DeviceNotFound(device_id.to_string());
    }

    match fallback {
        ErrorKind::Enumeration => MeterError::DeviceEnumerationFailed(message.to_string()),
        ErrorKind::Acquisition => MeterError::AcquisitionFailed(message.to_string()),
    }
}
