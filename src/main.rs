// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
mod audio;
mod bank;
mod config;
mod engine;
mod input;
mod riff;
mod soundboard;
#[cfg(test)]
mod testutil;
mod wav;

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{crate_version, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=keystroke soundboard

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/clackboard
ExecStart=/usr/local/bin/clackboard start --config "$CLACKBOARD_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=clackboard.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A low-latency keystroke soundboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the soundboard.
    Start {
        /// The path to the soundboard config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The sound directory. Overrides the config.
        #[arg(short, long)]
        sounds: Option<PathBuf>,
        /// The audio device to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Loads and lists the sound bank. Clips are checked against the output
    /// format from the config, or stereo 44.1kHz 16-bit without one.
    Bank {
        /// The path to the soundboard config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The sound directory. Overrides the config.
        path: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(err = %e, "Fatal error");
            eprintln!("clackboard: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Start {
            config,
            sounds,
            device,
        } => {
            let mut soundboard = config::Soundboard::load(config.as_deref())?;
            if let Some(sounds) = sounds {
                soundboard.set_sounds(sounds);
            }
            if let Some(device) = device {
                soundboard.audio_mut().set_device(&device);
            }
            soundboard::run(&soundboard)?;
        }
        Commands::Bank { config, path } => {
            let mut soundboard = config::Soundboard::load(config.as_deref())?;
            if let Some(path) = path {
                soundboard.set_sounds(path);
            }
            let (path, bank, format) = soundboard::load_bank(&soundboard)?;

            if bank.is_empty() {
                println!("No sounds found in {}.", path.display());
                return Ok(());
            }

            println!("Sounds (count: {}):", bank.len());
            for (key, edge, clip) in bank.iter() {
                let length = clip
                    .duration()
                    .map(|duration| format!("{} ms", duration.as_millis()))
                    .unwrap_or_else(|| "unknown length".to_string());
                println!(
                    "- {} {:<4} {} ({} bytes, {}, {}){}",
                    key,
                    edge,
                    clip.name(),
                    clip.byte_len(),
                    length,
                    clip.format(),
                    if format.accepts(clip.format()) {
                        ""
                    } else {
                        " [format mismatch]"
                    }
                );
            }
            println!("\nTotal: {} KB", bank.total_bytes() / 1024);
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let ports = input::midi::list_ports()?;

            if ports.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for port in ports {
                println!("- {}", port);
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
