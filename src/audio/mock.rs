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
use std::{collections::VecDeque, error::Error, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::{ChannelClosed, OutputFormat};
use crate::wav::Clip;

/// A mock device. Doesn't actually play anything, but remembers what it was asked to play.
///
/// The name may carry a channel limit, e.g. `mock:4`, after which opening fails.
#[derive(Clone)]
pub struct Device {
    name: String,
    limit: Option<usize>,
    channels: Arc<Mutex<Vec<Arc<Channel>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        let limit = match name.split_once(':') {
            Some((_, limit)) => Some(
                limit
                    .parse::<usize>()
                    .map_err(|e| format!("invalid mock channel limit {}: {}", limit, e))?,
            ),
            None => None,
        };

        Ok(Device {
            name: name.to_string(),
            limit,
            channels: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Gets a mock device that refuses to open more than the given number of channels.
    #[cfg(test)]
    pub fn with_limit(name: &str, limit: usize) -> Device {
        Device {
            name: name.to_string(),
            limit: Some(limit),
            channels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every channel opened so far, in opening order.
    #[cfg(test)]
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.lock().clone()
    }

    /// Returns the channel with the given label.
    #[cfg(test)]
    pub fn channel(&self, label: &str) -> Option<Arc<Channel>> {
        self.channels
            .lock()
            .iter()
            .find(|channel| channel.label == label)
            .cloned()
    }
}

impl crate::audio::Device for Device {
    fn open_channel(
        &self,
        label: &str,
        format: &OutputFormat,
    ) -> Result<Arc<dyn crate::audio::Channel>, Box<dyn Error>> {
        let mut channels = self.channels.lock();
        if let Some(limit) = self.limit {
            if channels.len() >= limit {
                return Err(format!("{} has no free channels (limit {})", self.name, limit).into());
            }
        }

        debug!(device = self.name, channel = label, format = %format, "Opening mock channel");
        let channel = Arc::new(Channel {
            label: label.to_string(),
            state: Mutex::new(State::default()),
        });
        channels.push(channel.clone());
        Ok(channel)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[derive(Default)]
struct State {
    playing: Option<Clip>,
    queue: VecDeque<Clip>,
    submitted: Vec<String>,
    cancels: usize,
    closed: bool,
}

/// A mock channel.
pub struct Channel {
    label: String,
    state: Mutex<State>,
}

impl Channel {
    /// Returns the name of the clip currently playing.
    #[cfg(test)]
    pub fn now_playing(&self) -> Option<String> {
        self.state
            .lock()
            .playing
            .as_ref()
            .map(|clip| clip.name().to_string())
    }

    /// Returns the names of the clips waiting behind the current one.
    #[cfg(test)]
    pub fn queued(&self) -> Vec<String> {
        self.state
            .lock()
            .queue
            .iter()
            .map(|clip| clip.name().to_string())
            .collect()
    }

    /// Returns the name of every clip ever submitted, in order.
    #[cfg(test)]
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }

    /// Returns how many times the channel was cancelled.
    #[cfg(test)]
    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancels
    }

    /// Returns true once the channel has been closed.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Simulates the current clip running out.
    #[cfg(test)]
    pub fn finish_current(&self) -> Option<String> {
        let mut state = self.state.lock();
        let finished = state.playing.take().map(|clip| clip.name().to_string());
        state.playing = state.queue.pop_front();
        finished
    }
}

impl crate::audio::Channel for Channel {
    fn submit(&self, clip: &Clip) -> Result<(), ChannelClosed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ChannelClosed);
        }

        state.submitted.push(clip.name().to_string());
        if state.playing.is_none() {
            state.playing = Some(clip.clone());
        } else {
            state.queue.push_back(clip.clone());
        }
        Ok(())
    }

    fn cancel(&self) -> Result<(), ChannelClosed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ChannelClosed);
        }

        state.cancels += 1;
        state.playing = None;
        state.queue.clear();
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            debug!(channel = self.label, "Closing mock channel");
        }
        state.closed = true;
        state.playing = None;
        state.queue.clear();
    }
}
