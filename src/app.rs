//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, MeterOptions};
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// A terminal microphone level meter with waveform, spectrum and loudness history
#[derive(Parser, Debug)]
#[command(name = "micmeter")]
#[command(version)]
#[command(about = "A terminal microphone level meter")]
#[command(long_about = "A terminal microphone level meter with real-time waveform, spectrum\nand loudness history.\n\nDEFAULT COMMAND:\n    If no command is specified, 'meter' is used by default.\n    Meter options (-d, -t) can be used without explicitly saying 'meter'.\n\nEXAMPLES:\n    # Meter the default microphone\n    $ micmeter\n\n    # Meter device #1 from list-devices with an alert at 85 dB\n    $ micmeter -d 1 -t 85\n\n    # Toggle a running meter from a hotkey daemon\n    $ pkill -USR1 micmeter\n\n    # Edit configuration file\n    $ micmeter config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/micmeter/micmeter.toml\n    Logs:               ~/.local/state/micmeter/micmeter.log.*"
)]
struct Cli {
    /// Input device id, index or "default" (meter default command)
    #[arg(short, long, value_name = "DEVICE", global = true)]
    device: Option<String>,

    /// Alert threshold in dB, 0-120 (meter default command)
    #[arg(short, long, value_name = "DB", global = true)]
    threshold: Option<f32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the live level meter (default)
    ///
    /// Space/Enter starts and stops, Up/Down move the alert threshold,
    /// Tab switches device, c toggles colours, Escape/q quits.
    #[command(visible_alias = "m")]
    Meter,

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in micmeter.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   micmeter completions bash > micmeter.bash
    ///   micmeter completions zsh > _micmeter
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "micmeter", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return exit_on_error(commands::handle_list_devices());
        }
        Some(Commands::Logs) => {
            return exit_on_error(commands::handle_logs());
        }
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Meter) => {
            commands::handle_meter(MeterOptions {
                device: cli.device,
                threshold: cli.threshold,
            })
            .await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

fn exit_on_error(result: anyhow::Result<()>) -> anyhow::Result<()> {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn meter_flags_work_without_subcommand() {
        let cli = Cli::try_parse_from(["micmeter", "-d", "1", "-t", "85"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.device.as_deref(), Some("1"));
        assert_eq!(cli.threshold, Some(85.0));

        let cli = Cli::try_parse_from(["micmeter", "meter", "--threshold", "60"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Meter)));
        assert_eq!(cli.threshold, Some(60.0));
    }
}
