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
use std::{any::Any, error::Error, fmt, sync::Arc};

use crate::config;
use crate::wav::Clip;

pub mod cpal;
pub mod format;
pub mod mock;
pub mod pool;
pub mod thread_priority;

pub use format::OutputFormat;
pub use pool::ChannelPool;

/// The channel's playback side has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("output channel is closed")]
pub struct ChannelClosed;

/// An output sink that can open independent playback channels.
pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// Opens a channel that plays clips in the given format. The label names the
    /// channel in logs.
    fn open_channel(
        &self,
        label: &str,
        format: &OutputFormat,
    ) -> Result<Arc<dyn Channel>, Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// A single playback channel. Every call returns without waiting on the
/// audio back-end.
pub trait Channel: std::marker::Send + std::marker::Sync {
    /// Starts the clip, or plays it after whatever the channel is already playing.
    fn submit(&self, clip: &Clip) -> Result<(), ChannelClosed>;

    /// Stops the current clip and drops anything pending.
    fn cancel(&self) -> Result<(), ChannelClosed>;

    /// Releases the channel. Closing twice is harmless.
    fn close(&self);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device named by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)?));
    };

    Ok(Arc::new(cpal::Device::get(device)?))
}
