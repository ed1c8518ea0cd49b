//! Display recent log entries.

use anyhow::anyhow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{log_dir, LOG_FILE_PREFIX};

const DEFAULT_LINES: usize = 50;

/// Prints the tail of the newest log file.
///
/// # Errors
/// - If the log directory cannot be determined or read
pub fn handle_logs() -> anyhow::Result<()> {
    let dir = log_dir()?;

    if !dir.exists() {
        println!("Log directory does not exist yet: {}", dir.display());
        println!("Logs will be created when the meter runs.");
        return Ok(());
    }

    let Some(log_file) = find_latest_log(&dir)? else {
        println!("No log files found in: {}", dir.display());
        return Ok(());
    };

    let content = fs::read_to_string(&log_file).map_err(|e| anyhow!("Failed to read log file: {e}"))?;
    if content.is_empty() {
        println!("Log file is empty: {}", log_file.display());
        return Ok(());
    }

    let lines = tail(&content, DEFAULT_LINES);
    let total = content.lines().count();
    if lines.len() < total {
        println!("Showing last {} of {} lines:", lines.len(), total);
    } else {
        println!("Showing all {total} lines:");
    }
    println!("Full log file at: {}", log_file.display());
    println!();

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Most recently modified `micmeter.log*` file, if any.
fn find_latest_log(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| anyhow!("Failed to read log directory: {e}"))?;

    let latest = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .filter_map(|path| {
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .max_by_key(|(_, modified)| *modified)
        .map(|(path, _)| path);

    Ok(latest)
}

fn tail(content: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    lines[lines.len().saturating_sub(count)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_returns_last_lines() {
        let content = (1..=60).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let lines = tail(&content, 50);
        assert_eq!(lines.len(), 50);
        assert_eq!(lines.first(), Some(&"11"));
        assert_eq!(lines.last(), Some(&"60"));
        assert_eq!(tail("a\nb", 50), vec!["a", "b"]);
    }

    #[test]
    fn latest_log_ignores_other_files() {
        let dir = std::env::temp_dir().join(format!("micmeter-logcmd-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        assert_eq!(find_latest_log(&dir).unwrap(), None);

        fs::write(dir.join("unrelated.txt"), "x").unwrap();
        fs::write(dir.join("micmeter.log.2026-10-19"), "line").unwrap();
        assert_eq!(
            find_latest_log(&dir).unwrap(),
            Some(dir.join("micmeter.log.2026-10-19"))
        );

        let _ = fs::remove_dir_all(&dir);
    }
}
