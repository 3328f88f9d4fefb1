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

//! Startup and shutdown of a running soundboard.

use std::{error::Error, path::PathBuf, sync::Arc};

use tokio::task::JoinSet;
use tracing::{error, info, span, warn, Level};

use crate::audio::{self, ChannelPool, OutputFormat};
use crate::bank::SoundBank;
use crate::config;
use crate::engine::{self, EngineStats, SoundboardState};
use crate::input::{self, Driver};

/// Runs the soundboard described by the configuration until every key event
/// source ends or the process is interrupted.
pub fn run(config: &config::Soundboard) -> Result<EngineStats, Box<dyn Error>> {
    let device = audio::get_device(config.audio())?;
    let drivers = config
        .input()
        .sources()
        .iter()
        .map(input::driver)
        .collect::<Vec<Arc<dyn Driver>>>();
    run_with(config, device, drivers)
}

/// Loads the configured sound directory and resolves the output format the clips
/// should match.
pub fn load_bank(
    config: &config::Soundboard,
) -> Result<(PathBuf, SoundBank, OutputFormat), Box<dyn Error>> {
    let sounds = config.sounds_dir()?;
    let format = config.audio().output_format()?;
    let bank = SoundBank::load(&sounds);
    Ok((sounds, bank, format))
}

/// Runs the soundboard against the given device and drivers.
pub fn run_with(
    config: &config::Soundboard,
    device: Arc<dyn audio::Device>,
    drivers: Vec<Arc<dyn Driver>>,
) -> Result<EngineStats, Box<dyn Error>> {
    let span = span!(Level::INFO, "soundboard");
    let _enter = span.enter();

    let (_, bank, format) = load_bank(config)?;
    for mismatch in bank.format_mismatches(&format) {
        warn!(
            key = %mismatch.key,
            edge = %mismatch.edge,
            clip = mismatch.clip,
            found = mismatch.found,
            expected = %format,
            "Clip format differs from the output format, it will not play back faithfully"
        );
    }

    let pool = match ChannelPool::open(
        device.as_ref(),
        &bank,
        &format,
        config.audio().channel_mode(),
        config.audio().retrigger(),
    ) {
        Ok(pool) => pool,
        Err(failure) => {
            error!(
                key = ?failure.key,
                channel = failure.label,
                reason = failure.reason,
                "Unable to open output channels"
            );
            return Err(failure.into());
        }
    };

    let (events, events_rx) = input::queue(config.input().queue_depth());
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    let engine = engine::spawn(SoundboardState::new(bank, pool), events_rx, shutdown_rx)?;

    // Blocking readers can't be cancelled, so the runtime is shut down in the
    // background rather than waiting on them.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let interrupted = runtime.block_on(async move {
        if drivers.is_empty() {
            warn!("No key event sources configured.");
        }

        let mut monitors = JoinSet::new();
        for driver in drivers {
            monitors.spawn(driver.monitor_events(events.clone()));
        }
        drop(events);

        tokio::select! {
            _ = interrupt() => {
                info!("Interrupted, shutting down.");
                true
            }
            _ = wait_for_sources(&mut monitors) => {
                info!("All key event sources ended.");
                false
            }
        }
    });

    // Once the sources have ended the engine drains the queue and stops by itself.
    if interrupted {
        let _ = shutdown_tx.send(());
    }
    let stats = engine
        .join()
        .map_err(|_| "trigger engine thread panicked")?;
    runtime.shutdown_background();
    Ok(stats)
}

/// Resolves on Ctrl-C. Never resolves if the signal can't be watched.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(err = %e, "Unable to listen for interrupts");
        std::future::pending::<()>().await
    }
}

async fn wait_for_sources(
    monitors: &mut JoinSet<Result<Result<(), std::io::Error>, tokio::task::JoinError>>,
) {
    while let Some(result) = monitors.join_next().await {
        match result {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(err = %e, "Key event source failed"),
            Ok(Err(e)) | Err(e) => error!(err = %e, "Key event source task failed"),
        }
    }
}
