//! Live microphone level meter.
//!
//! Drives the acquisition session from the redraw loop: one tick per frame,
//! keyboard control of recording, threshold, device and colours. Supports an
//! external start/stop trigger via SIGUSR1.
//!
//! The threshold and colour mode written back to `micmeter.toml` on exit are
//! presentation settings. Session state (readings, history, the open device)
//! is never persisted and starts empty on every run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::audio::devices::DEFAULT_DEVICE;
use crate::audio::{
    format_device_label, resolve_device, AudioBackend, CpalBackend, DeviceDirectory, InputDevice,
};
use crate::config::{ColorMode, MeterConfig};
use crate::meter::Threshold;
use crate::session::Session;
use crate::ui::error::report_fatal;
use crate::ui::{MeterCommand, MeterTui, MeterView};

/// Command-line overrides for the meter.
#[derive(Debug, Clone, Default)]
pub struct MeterOptions {
    /// Device id, index or "default"
    pub device: Option<String>,
    /// Alert threshold in normalized dB
    pub threshold: Option<f32>,
}

/// Runs the meter until the operator quits.
///
/// Threshold and colour mode changes made with the keyboard are written back
/// to the configuration file on exit.
///
/// # Errors
/// - If the configuration is invalid
/// - If the terminal cannot be set up or drawn to
pub async fn handle_meter(options: MeterOptions) -> anyhow::Result<()> {
    tracing::info!("=== micmeter started ===");

    let config = match MeterConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            report_fatal(
                "Configuration Error",
                &format!("{err}\n\nPlease check your ~/.config/micmeter/micmeter.toml file and try again."),
            );
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let audio = config.audio.clone();
    let device_spec = options.device.unwrap_or_else(|| audio.device.clone());
    let mut threshold = Threshold::new(options.threshold.unwrap_or(config.meter.threshold));
    let mut color_mode = config.meter.color_mode;
    let initial = (threshold, color_mode);

    tracing::info!(
        "Configuration loaded: device={}, window_size={}, smoothing={}, refresh_rate={}Hz, threshold={}",
        device_spec,
        audio.window_size,
        audio.smoothing,
        audio.refresh_rate,
        threshold.value()
    );

    let backend = CpalBackend::new();
    let mut notice: Option<String> = None;
    let devices = backend.list_input_devices().unwrap_or_else(|e| {
        tracing::warn!("Device enumeration failed: {}", e);
        notice = Some(e.to_string());
        Vec::new()
    });
    let mut selected = select_device(&devices, &device_spec);
    tracing::info!("Selected input device '{}' ({})", selected.id, selected.label);

    let mut session = Session::new(backend, audio.capture_settings(), audio.history_capacity());
    let mut tui = MeterTui::new().map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    let toggle_requested = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&toggle_requested))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    if let Err(e) = session.start(&selected.id).await {
        tracing::warn!("Initial start failed: {}", e);
    }

    let frame_interval = audio.frame_interval();
    let history_window_secs = f64::from(audio.history_seconds);

    loop {
        let frame_started = Instant::now();

        if toggle_requested.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: toggling acquisition via external trigger");
            toggle_recording(&mut session, &selected).await;
        }

        if let Err(e) = session.on_redraw() {
            tracing::warn!("Tick failed: {}", e);
        }

        tui.draw(&MeterView {
            snapshot: session.snapshot(),
            threshold,
            color_mode,
            device_label: &selected.label,
            history_window_secs,
            notice: notice.as_deref(),
        })
        .map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;

        let remaining = frame_interval.saturating_sub(frame_started.elapsed());
        let command = tui.handle_input(remaining).map_err(|e| {
            tracing::error!("Input handling error: {}", e);
            anyhow::anyhow!("Input handling error: {e}")
        })?;

        match command {
            MeterCommand::Continue => {}
            MeterCommand::ToggleRecording => {
                notice = None;
                toggle_recording(&mut session, &selected).await;
            }
            MeterCommand::ThresholdUp => threshold.adjust(1.0),
            MeterCommand::ThresholdDown => threshold.adjust(-1.0),
            MeterCommand::ToggleColorMode => color_mode = color_mode.toggled(),
            MeterCommand::NextDevice => match session.backend().list_input_devices() {
                Ok(devices) => match next_device(&devices, &selected.id) {
                    Some(device) => {
                        tracing::info!("Switching input device to '{}'", device.id);
                        notice = Some(format!("Selected {}", device.label));
                        selected = device;
                        if session.is_active() {
                            if let Err(e) = session.start(&selected.id).await {
                                tracing::warn!("Restart on new device failed: {}", e);
                            }
                        }
                    }
                    None => notice = Some("No input devices available".to_string()),
                },
                Err(e) => {
                    tracing::warn!("Device enumeration failed: {}", e);
                    notice = Some(e.to_string());
                }
            },
            MeterCommand::Quit => break,
        }
    }

    session.stop();
    tui.cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;

    if let Some(updated) = settings_to_save(&config, initial, (threshold, color_mode)) {
        if let Err(e) = updated.save() {
            tracing::warn!("Failed to save meter settings: {}", e);
        }
    }

    tracing::info!("=== micmeter exited successfully ===");
    Ok(())
}

/// The configuration to write back when the operator changed a presentation
/// setting during the run. Command-line overrides alone are not saved.
fn settings_to_save(
    config: &MeterConfig,
    initial: (Threshold, ColorMode),
    current: (Threshold, ColorMode),
) -> Option<MeterConfig> {
    if current == initial {
        return None;
    }
    let mut updated = config.clone();
    updated.meter.threshold = current.0.value();
    updated.meter.color_mode = current.1;
    Some(updated)
}

/// Stops an active session, otherwise (re)starts it on `device`.
///
/// Start failures are already recorded on the session and shown on screen.
async fn toggle_recording<B: AudioBackend>(session: &mut Session<B>, device: &InputDevice) {
    if session.is_active() {
        session.stop();
    } else if let Err(e) = session.start(&device.id).await {
        tracing::warn!("Start failed: {}", e);
    }
}

/// Resolves the configured device, keeping an unknown id so that starting
/// reports it as not found.
fn select_device(devices: &[InputDevice], spec: &str) -> InputDevice {
    resolve_device(devices, spec).unwrap_or_else(|e| {
        tracing::warn!("{}", e);
        let id = if spec.parse::<usize>().is_ok() { DEFAULT_DEVICE } else { spec };
        InputDevice {
            id: id.to_string(),
            label: format_device_label(id, id),
            is_default: false,
        }
    })
}

/// The device after `current_id`, wrapping around. Falls back to the first.
fn next_device(devices: &[InputDevice], current_id: &str) -> Option<InputDevice> {
    let next = match devices.iter().position(|d| d.id == current_id) {
        Some(index) => (index + 1) % devices.len(),
        None => 0,
    };
    devices.get(next).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<InputDevice> {
        ["pulse", "USB Mic", "hw:1,0"]
            .iter()
            .enumerate()
            .map(|(i, id)| InputDevice {
                id: id.to_string(),
                label: id.to_string(),
                is_default: i == 0,
            })
            .collect()
    }

    #[test]
    fn only_keyboard_changes_are_saved() {
        let config = MeterConfig::default();
        let overridden = (Threshold::new(90.0), ColorMode::Gradient);
        assert_eq!(settings_to_save(&config, overridden, overridden), None);

        let changed = (Threshold::new(91.0), ColorMode::Default);
        let saved = settings_to_save(&config, overridden, changed).unwrap();
        assert_eq!(saved.meter.threshold, 91.0);
        assert_eq!(saved.meter.color_mode, ColorMode::Default);
        assert_eq!(saved.audio, config.audio);
    }

    #[test]
    fn next_device_cycles() {
        let devices = devices();
        assert_eq!(next_device(&devices, "pulse").unwrap().id, "USB Mic");
        assert_eq!(next_device(&devices, "hw:1,0").unwrap().id, "pulse");
        assert_eq!(next_device(&devices, "unplugged").unwrap().id, "pulse");
        assert_eq!(next_device(&[], "pulse"), None);
    }

    #[test]
    fn select_device_resolves_known_specs() {
        let devices = devices();
        assert_eq!(select_device(&devices, "default").id, "pulse");
        assert_eq!(select_device(&devices, "1").id, "USB Mic");
        assert_eq!(select_device(&devices, "hw:1,0").id, "hw:1,0");
    }

    #[test]
    fn select_device_keeps_unknown_ids() {
        let devices = devices();
        assert_eq!(select_device(&devices, "Missing Mic").id, "Missing Mic");
        assert_eq!(select_device(&devices, "9").id, DEFAULT_DEVICE);
        assert_eq!(select_device(&[], "default").id, DEFAULT_DEVICE);
    }
}
