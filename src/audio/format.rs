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

use std::{error::Error, fmt};

use crate::wav::{FormatDescriptor, FORMAT_PCM};

/// The only sample depth the output path understands.
pub const SUPPORTED_BITS_PER_SAMPLE: u16 = 16;

/// The fixed format every output channel is opened with. Clip bytes are
/// interpreted as interleaved little-endian samples in this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl OutputFormat {
    /// Creates a new OutputFormat
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".into());
        }
        if channels == 0 {
            return Err("Channel count must be greater than 0".into());
        }
        if bits_per_sample != SUPPORTED_BITS_PER_SAMPLE {
            return Err(format!(
                "Unsupported bits per sample {}, only {} is supported",
                bits_per_sample, SUPPORTED_BITS_PER_SAMPLE
            )
            .into());
        }

        Ok(OutputFormat {
            sample_rate,
            channels,
            bits_per_sample,
        })
    }

    /// Returns true if a clip in the given format plays back unaltered.
    pub fn accepts(&self, format: &FormatDescriptor) -> bool {
        format.format_tag == FORMAT_PCM
            && format.sample_rate == self.sample_rate
            && format.channels == self.channels
            && format.bits_per_sample == self.bits_per_sample
    }
}

impl Default for OutputFormat {
    /// Stereo, 16-bit, 44.1kHz
    fn default() -> Self {
        OutputFormat {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: SUPPORTED_BITS_PER_SAMPLE,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {} bits, {} channel(s)",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}
