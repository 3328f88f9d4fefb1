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
use std::error::Error;

use serde::Deserialize;

use crate::audio::OutputFormat;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// How output channels are allocated across keys.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One channel for every key that has at least one clip. Keys never preempt each other.
    #[default]
    PerKey,
    /// A single channel used by every key.
    Shared,
}

/// What a channel does when triggered while it is still playing.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Stop whatever the channel is playing and start the new clip.
    #[default]
    Cut,
    /// Play the new clip after whatever the channel is already playing.
    Queue,
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device. "default" picks the host's default output.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Output channel count (default: 2)
    channels: Option<u16>,

    /// Output bits per sample (default: 16, the only supported depth)
    bits_per_sample: Option<u16>,

    /// Channel allocation (default: per_key)
    channel_mode: Option<ChannelMode>,

    /// Retrigger policy (default: cut)
    retrigger: Option<RetriggerPolicy>,
}

impl Audio {
    /// New will create a new Audio configuration.
    #[cfg(test)]
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Overrides the configured device.
    pub fn set_device(&mut self, device: &str) {
        self.device = Some(device.to_string());
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 2)
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the output bits per sample (default: 16)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the channel mode (default: per_key)
    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode.unwrap_or_default()
    }

    /// Returns the retrigger policy (default: cut)
    pub fn retrigger(&self) -> RetriggerPolicy {
        self.retrigger.unwrap_or_default()
    }

    /// Returns the validated output format.
    pub fn output_format(&self) -> Result<OutputFormat, Box<dyn Error>> {
        OutputFormat::new(self.sample_rate(), self.channels(), self.bits_per_sample())
    }
}
