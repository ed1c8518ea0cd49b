//! Configuration file editor command.

use std::process::Command;

use crate::config::{config_path, MeterConfig};

/// Opens the configuration file in `$EDITOR`, falling back to nano, then vi.
///
/// The file is created with defaults first if it does not exist, and
/// re-validated after editing.
///
/// # Errors
/// - If no editor can be found or it exits with an error
pub fn handle_config() -> anyhow::Result<()> {
    let path = config_path()?;
    if !path.exists() {
        MeterConfig::default().save_to(&path)?;
    }

    tracing::info!("Opening config file: {}", path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor).arg(&path).status().map_err(|e| {
        anyhow::anyhow!(
            "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
        )
    })?;

    if !status.success() {
        anyhow::bail!("Editor exited with error code: {}", status.code().unwrap_or(-1));
    }

    match MeterConfig::load_from(&path) {
        Ok(_) => tracing::info!("Config file edited successfully"),
        Err(e) => eprintln!("Warning: the edited configuration is invalid: {e}"),
    }
    Ok(())
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.trim().is_empty() {
            return Ok(editor);
        }
    }

    ["nano", "vi"]
        .iter()
        .find(|editor| is_editor_available(editor))
        .map(|editor| editor.to_string())
        .ok_or_else(|| anyhow::anyhow!("No editor found. Please set the $EDITOR environment variable."))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
