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

//! The output channel pool. Channels are opened once at startup and routed
//! per key: either every key with a clip gets its own channel, or every key
//! shares a single one.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audio::{Channel, Device, OutputFormat};
use crate::bank::{KeyId, SoundBank, NUM_KEYS};
use crate::config::{ChannelMode, RetriggerPolicy};
use crate::wav::Clip;

/// Label of the single channel used in shared mode.
const SHARED_LABEL: &str = "shared";

/// An output channel couldn't be opened. Fatal at startup.
#[derive(Debug, thiserror::Error)]
#[error("unable to open output channel {label}: {reason}")]
pub struct ChannelOpenFailure {
    /// The key the channel was for. None for the shared channel.
    pub key: Option<KeyId>,
    pub label: String,
    pub reason: String,
}

/// The set of open output channels and the key to channel routing.
pub struct ChannelPool {
    channels: Vec<Arc<dyn Channel>>,
    routes: Box<[Option<usize>; NUM_KEYS]>,
    retrigger: RetriggerPolicy,
    closed: bool,
}

impl ChannelPool {
    /// Opens the channels the bank needs. On failure every channel opened so far
    /// is closed again.
    pub fn open(
        device: &dyn Device,
        bank: &SoundBank,
        format: &OutputFormat,
        mode: ChannelMode,
        retrigger: RetriggerPolicy,
    ) -> Result<ChannelPool, ChannelOpenFailure> {
        let mut pool = ChannelPool {
            channels: Vec::new(),
            routes: Box::new([None; NUM_KEYS]),
            retrigger,
            closed: false,
        };

        match mode {
            ChannelMode::PerKey => {
                for key in bank.keys() {
                    let index = pool.open_one(device, Some(key), &key.to_string(), format)?;
                    pool.routes[key.index()] = Some(index);
                }
            }
            ChannelMode::Shared => {
                let index = pool.open_one(device, None, SHARED_LABEL, format)?;
                pool.routes.fill(Some(index));
            }
        }

        info!(
            device = %device,
            channels = pool.channels.len(),
            mode = ?mode,
            retrigger = ?retrigger,
            format = %format,
            "Output channels opened"
        );
        Ok(pool)
    }

    fn open_one(
        &mut self,
        device: &dyn Device,
        key: Option<KeyId>,
        label: &str,
        format: &OutputFormat,
    ) -> Result<usize, ChannelOpenFailure> {
        match device.open_channel(label, format) {
            Ok(channel) => {
                self.channels.push(channel);
                Ok(self.channels.len() - 1)
            }
            Err(e) => {
                self.shutdown();
                Err(ChannelOpenFailure {
                    key,
                    label: label.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Plays the clip on the key's channel. Returns false if the key has no
    /// channel or the channel is gone.
    pub fn trigger(&self, key: KeyId, clip: &Clip) -> bool {
        if self.closed {
            return false;
        }
        let Some(channel) = self.routes[key.index()].map(|index| &self.channels[index]) else {
            return false;
        };

        let result = match self.retrigger {
            RetriggerPolicy::Cut => channel.cancel().and_then(|_| channel.submit(clip)),
            RetriggerPolicy::Queue => channel.submit(clip),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, clip = clip.name(), err = %e, "Unable to trigger clip");
                false
            }
        }
    }

    /// Returns the number of open channels.
    pub fn channel_count(&self) -> usize {
        if self.closed {
            0
        } else {
            self.channels.len()
        }
    }

    /// Closes every channel. Calling this more than once does nothing.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        for channel in &self.channels {
            channel.close();
        }
        self.closed = true;
        if !self.channels.is_empty() {
            info!(channels = self.channels.len(), "Output channels closed");
        }
    }
}

impl Drop for ChannelPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
