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

use std::{
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::bank::{slot_path, Edge, KeyId};
use crate::wav::{Clip, FORMAT_PCM};

/// Builds a RIFF container by hand. Odd chunks get a pad byte and the declared
/// size is computed the way a well-formed writer would.
pub fn riff(form: &[u8; 4], chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(form);
    for (id, data) in chunks {
        body.extend_from_slice(*id);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }

    let mut bytes = Vec::with_capacity(body.len() + 8);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

/// Builds a 16 byte PCM `fmt ` payload.
pub fn fmt_chunk(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Vec<u8> {
    let block_align = channels * bits_per_sample / 8;
    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits_per_sample.to_le_bytes());
    fmt
}

/// Builds a stereo 16-bit 44.1kHz clip in memory with a payload of the given length.
pub fn test_clip(name: &str, data_len: usize) -> Clip {
    let data: Vec<u8> = (0..data_len).map(|i| i as u8).collect();
    let bytes: Arc<[u8]> = riff(
        b"WAVE",
        &[(b"fmt ", &fmt_chunk(2, 44100, 16)), (b"data", &data)],
    )
    .into();
    match Clip::from_bytes(name, bytes) {
        Ok(clip) => clip,
        Err(e) => panic!("test clip should parse: {}", e),
    }
}

/// Writes interleaved 16-bit samples to a WAV file.
pub fn write_wav(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    for sample in samples {
        writer.write_sample(*sample)?;
    }

    writer.finalize()
}

/// Writes the clip for one key and edge into a sound directory.
pub fn write_slot(
    dir: &Path,
    key: u8,
    edge: Edge,
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
) {
    let path = slot_path(dir, KeyId::new(key), edge);
    write_wav(&path, channels, sample_rate, samples).unwrap();
}

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(5);
    let max_tick = Duration::from_millis(100);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}
