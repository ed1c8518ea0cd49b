//! Input device directory backed by the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};

use super::stderr::with_stderr_silenced;
use super::{DeviceDirectory, InputDevice};
use crate::error::{classify_backend_error, ErrorKind, MeterError, Result};

/// Device spec meaning "whatever the system prefers".
pub const DEFAULT_DEVICE: &str = "default";

/// Enumerates cpal input devices. Device ids are the cpal device names.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDirectory;

/// A device plus its native input format, for `list-devices`.
#[derive(Debug, Clone)]
pub struct DeviceDescription {
    pub device: InputDevice,
    /// Sample rate and channel count, when the device reports them
    pub native_config: Option<(u32, u16)>,
}

impl CpalDirectory {
    pub fn new() -> Self {
        Self
    }

    /// Lists devices together with their default input configuration.
    pub fn describe_devices(&self) -> Result<Vec<DeviceDescription>> {
        with_stderr_silenced(|| -> Result<Vec<DeviceDescription>> {
            let host = cpal::default_host();
            let default_name = host.default_input_device().and_then(|d| d.name().ok());

            let devices = host
                .input_devices()
                .map_err(|e| classify_backend_error(&e.to_string(), ErrorKind::Enumeration, DEFAULT_DEVICE))?;

            Ok(devices
                .filter_map(|device| {
                    let name = device.name().ok()?;
                    let native_config = device
                        .default_input_config()
                        .ok()
                        .map(|config| (config.sample_rate().0, config.channels()));
                    Some(DeviceDescription {
                        device: InputDevice {
                            label: format_device_label(&name, &name),
                            is_default: default_name.as_deref() == Some(name.as_str()),
                            id: name,
                        },
                        native_config,
                    })
                })
                .collect())
        })
    }
}

impl DeviceDirectory for CpalDirectory {
    fn list_input_devices(&self) -> Result<Vec<InputDevice>> {
        let devices = self
            .describe_devices()?
            .into_iter()
            .map(|description| description.device)
            .collect::<Vec<_>>();
        tracing::debug!("Found {} input devices", devices.len());
        Ok(devices)
    }

    async fn request_access(&self, device_id: &str) -> Result<()> {
        let id = device_id.to_string();
        tokio::task::spawn_blocking(move || probe_device(&id))
            .await
            .map_err(|e| MeterError::AcquisitionFailed(format!("device probe did not finish: {e}")))?
    }
}

/// Checks that the device exists and will hand out an input configuration.
fn probe_device(device_id: &str) -> Result<()> {
    with_stderr_silenced(|| -> Result<()> {
        let host = cpal::default_host();
        let device = find_input_device(&host, device_id)?;
        device
            .default_input_config()
            .map_err(|e| match e {
                cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                    MeterError::DeviceNotFound(device_id.to_string())
                }
                other => classify_backend_error(&other.to_string(), ErrorKind::Acquisition, device_id),
            })?;
        tracing::debug!("Access to input device '{}' confirmed", device_id);
        Ok(())
    })
}

/// Looks up a cpal input device by id. `"default"` selects the host default.
pub(crate) fn find_input_device(host: &cpal::Host, device_id: &str) -> Result<cpal::Device> {
    if device_id == DEFAULT_DEVICE {
        return host
            .default_input_device()
            .ok_or_else(|| MeterError::DeviceNotFound(device_id.to_string()));
    }

    let devices = host
        .input_devices()
        .map_err(|e| classify_backend_error(&e.to_string(), ErrorKind::Enumeration, device_id))?;

    for device in devices {
        if device.name().is_ok_and(|name| name == device_id) {
            return Ok(device);
        }
    }

    Err(MeterError::DeviceNotFound(device_id.to_string()))
}

/// Shortens platform labels for display.
///
/// Built-in laptop microphones collapse to one friendly name; devices without
/// a label are named after the start of their id.
pub fn format_device_label(id: &str, label: &str) -> String {
    if label.is_empty() {
        let short: String = id.chars().take(8).collect();
        return format!("Microphone {short}");
    }
    if label.contains("Built-in") || label.contains("MacBook") {
        return "Built-in Microphone".to_string();
    }
    label.to_string()
}

/// Picks a device from `devices` by spec: `"default"`, a numeric index, or an id.
pub fn resolve_device(devices: &[InputDevice], spec: &str) -> Result<InputDevice> {
    if spec == DEFAULT_DEVICE {
        return devices
            .iter()
            .find(|d| d.is_default)
            .or_else(|| devices.first())
            .cloned()
            .ok_or_else(|| MeterError::DeviceNotFound(spec.to_string()));
    }

    if let Ok(index) = spec.parse::<usize>() {
        return devices
            .get(index)
            .cloned()
            .ok_or_else(|| MeterError::DeviceNotFound(spec.to_string()));
    }

    devices
        .iter()
        .find(|d| d.id == spec)
        .cloned()
        .ok_or_else(|| MeterError::DeviceNotFound(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, is_default: bool) -> InputDevice {
        InputDevice {
            id: id.to_string(),
            label: format_device_label(id, id),
            is_default,
        }
    }

    #[test]
    fn built_in_labels_are_simplified() {
        assert_eq!(
            format_device_label("x", "MacBook Pro Microphone"),
            "Built-in Microphone"
        );
        assert_eq!(
            format_device_label("x", "Built-in Audio Analog Stereo"),
            "Built-in Microphone"
        );
        assert_eq!(format_device_label("x", "Yeti Stereo"), "Yeti Stereo");
    }

    #[test]
    fn unlabeled_devices_use_id_prefix() {
        assert_eq!(
            format_device_label("3f9a2c71deadbeef", ""),
            "Microphone 3f9a2c71"
        );
        assert_eq!(format_device_label("abc", ""), "Microphone abc");
    }

    #[test]
    fn resolve_prefers_marked_default() {
        let devices = vec![device("a", false), device("b", true)];
        assert_eq!(resolve_device(&devices, "default").map(|d| d.id), Ok("b".to_string()));

        let devices = vec![device("a", false), device("b", false)];
        assert_eq!(resolve_device(&devices, "default").map(|d| d.id), Ok("a".to_string()));
    }

    #[test]
    fn resolve_by_index_and_id() {
        let devices = vec![device("a", true), device("USB Mic", false)];
        assert_eq!(resolve_device(&devices, "1").map(|d| d.id), Ok("USB Mic".to_string()));
        assert_eq!(
            resolve_device(&devices, "USB Mic").map(|d| d.id),
            Ok("USB Mic".to_string())
        );
    }

    #[test]
    fn resolve_reports_missing_devices() {
        let devices = vec![device("a", true)];
        assert_eq!(
            resolve_device(&devices, "5"),
            Err(MeterError::DeviceNotFound("5".to_string()))
        );
        assert_eq!(
            resolve_device(&[], "default"),
            Err(MeterError::DeviceNotFound("default".to_string()))
        );
    }
}
