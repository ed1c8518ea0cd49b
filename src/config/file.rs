//! Configuration file management for micmeter.
//!
//! Loads, validates and saves `~/.config/micmeter/micmeter.toml`.

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::{CaptureSettings, InputConstraints, DEFAULT_SMOOTHING, DEFAULT_WINDOW_SIZE};
use crate::meter::{Threshold, DB_MAX, DB_MIN};

/// Palette used by the waveform and spectrum views.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Single accent colour
    Default,
    /// Multi-colour gradient across the width
    #[default]
    Gradient,
}

impl ColorMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Default => Self::Gradient,
            Self::Gradient => Self::Default,
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Gradient => write!(f, "gradient"),
        }
    }
}

/// Audio capture and sampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Input device. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `micmeter list-devices`
    /// - device name from `micmeter list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Samples analysed per tick (power of two)
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Spectrum smoothing time constant, 0 (none) to just below 1
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Display refresh rate in Hz; one tick per redraw
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u32,
    /// Seconds of loudness history kept for the chart
    #[serde(default = "default_history_seconds")]
    pub history_seconds: u32,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_smoothing() -> f32 {
    DEFAULT_SMOOTHING
}

fn default_refresh_rate() -> u32 {
    60
}

fn default_history_seconds() -> u32 {
    60
}

impl AudioConfig {
    /// Number of history points: one per tick over the history window.
    pub fn history_capacity(&self) -> usize {
        self.refresh_rate as usize * self.history_seconds as usize
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            window_size: self.window_size,
            smoothing: self.smoothing,
            constraints: InputConstraints::raw(),
        }
    }

    /// Time between redraws.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.refresh_rate.max(1)))
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            window_size: default_window_size(),
            smoothing: default_smoothing(),
            refresh_rate: default_refresh_rate(),
            history_seconds: default_history_seconds(),
        }
    }
}

/// Alert and display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSettings {
    /// Alert threshold in normalized dB (0-120)
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub color_mode: ColorMode,
}

fn default_threshold() -> f32 {
    Threshold::default().value()
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            color_mode: ColorMode::default(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub meter: MeterSettings,
}

impl MeterConfig {
    /// Loads and validates the configuration, writing defaults on first run.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be read or written
    /// - If the TOML is malformed or a value is out of range
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;
        Self::load_from(&path)
    }

    /// Loads from an explicit path; a missing file is created with defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&content)?;
        tracing::debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parses and validates TOML content.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: MeterConfig =
            toml::from_str(content).map_err(|e| anyhow!("Invalid configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the meter cannot run with. Errors name the key.
    pub fn validate(&self) -> anyhow::Result<()> {
        let audio = &self.audio;

        if !(32..=32768).contains(&audio.window_size) || !audio.window_size.is_power_of_two() {
            bail!(
                "audio.window_size must be a power of two between 32 and 32768 (got {})",
                audio.window_size
            );
        }
        if !(0.0..1.0).contains(&audio.smoothing) {
            bail!("audio.smoothing must be in [0, 1) (got {})", audio.smoothing);
        }
        if audio.refresh_rate == 0 {
            bail!("audio.refresh_rate must be greater than zero");
        }
        if audio.history_seconds == 0 {
            bail!("audio.history_seconds must be greater than zero");
        }
        if audio.device.trim().is_empty() {
            bail!("audio.device must not be empty (use \"default\")");
        }
        if !(DB_MIN..=DB_MAX).contains(&self.meter.threshold) {
            bail!(
                "meter.threshold must be between {DB_MIN} and {DB_MAX} dB (got {})",
                self.meter.threshold
            );
        }
        Ok(())
    }

    /// Saves configuration to the user's config directory.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Path of the config file: `~/.config/micmeter/micmeter.toml`.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".config").join("micmeter").join("micmeter.toml"))
}
