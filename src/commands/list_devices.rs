//! List available audio input devices.

use crate::audio::CpalDirectory;

/// Prints every input device with the id accepted by `audio.device`.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    let descriptions = CpalDirectory::new()
        .describe_devices()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    if descriptions.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();

    for (index, description) in descriptions.iter().enumerate() {
        let device = &description.device;
        let default_indicator = if device.is_default { " [DEFAULT]" } else { "" };
        let config_info = match description.native_config {
            Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
            None => "configuration unavailable".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {}{}", device.id, default_indicator);
        if device.label != device.id {
            println!("    Label: {}", device.label);
        }
        println!("    Config: {config_info}");
        println!();
    }

    println!("Set `device` under [audio] in micmeter.toml to an ID or a name.");
    Ok(())
}
