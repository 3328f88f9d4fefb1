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

//! WAV loading on top of the RIFF walker.
//!
//! Only the `fmt ` and `data` chunks are read. Samples are never decoded or
//! copied: a [`Clip`] keeps the whole file buffer alive and hands out a view of
//! the PCM payload.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::riff::{self, Chunk, ChunkVisitor, ContainerError, FourCC, Visit};

/// Format tag for integer PCM.
pub const FORMAT_PCM: u16 = 1;

/// The part of `fmt ` every PCM file carries.
const FMT_MIN_LEN: usize = 16;

/// The `fmt ` chunk of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatDescriptor {
    /// Parses the descriptor from a `fmt ` payload. Extension bytes past the
    /// first 16 are ignored.
    pub fn parse(bytes: &[u8]) -> Result<FormatDescriptor, Incomplete> {
        if bytes.len() < FMT_MIN_LEN {
            return Err(Incomplete::TruncatedFormat(bytes.len()));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        Ok(FormatDescriptor {
            format_tag: u16_at(0),
            channels: u16_at(2),
            sample_rate: u32_at(4),
            avg_bytes_per_sec: u32_at(8),
            block_align: u16_at(12),
            bits_per_sample: u16_at(14),
        })
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {} bits, {} channel(s)",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}

/// The ways a structurally valid WAV file can still be unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Incomplete {
    #[error("no fmt chunk")]
    MissingFormat,

    #[error("fmt chunk is {0} bytes, expected at least 16")]
    TruncatedFormat(usize),

    #[error("no data chunk")]
    MissingData,

    #[error("data chunk is empty")]
    EmptyData,
}

/// Error loading a single sound file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("malformed container: {0}")]
    MalformedContainer(#[from] ContainerError),

    #[error("incomplete WAV file: {0}")]
    IncompleteWavFile(#[from] Incomplete),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Returns true if the file simply doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Records the `fmt ` and `data` chunks while walking. Later duplicates win.
#[derive(Default)]
struct FmtAndData<'a> {
    fmt: Option<&'a [u8]>,
    data: Option<Chunk<'a>>,
}

impl<'a> ChunkVisitor<'a> for FmtAndData<'a> {
    fn visit(&mut self, chunk: Chunk<'a>) -> Visit {
        if chunk.id == FourCC::FMT {
            self.fmt = Some(chunk.data);
        } else if chunk.id == FourCC::DATA {
            self.data = Some(chunk);
        }
        Visit::Continue
    }
}

/// A parsed WAV file borrowing the buffer it was parsed from.
#[derive(Debug, Clone, Copy)]
pub struct Wav<'a> {
    pub format: FormatDescriptor,
    pub data: &'a [u8],
    /// Offset of `data` from the start of the buffer.
    pub data_offset: usize,
}

impl<'a> Wav<'a> {
    /// Parses a WAV file from its raw bytes.
    pub fn parse(bytes: &'a [u8]) -> Result<Wav<'a>, LoadError> {
        let mut chunks = FmtAndData::default();
        riff::walk(bytes, FourCC::WAVE, &mut chunks)?;

        let format = FormatDescriptor::parse(chunks.fmt.ok_or(Incomplete::MissingFormat)?)?;
        let data = chunks.data.ok_or(Incomplete::MissingData)?;
        if data.data.is_empty() {
            return Err(Incomplete::EmptyData.into());
        }

        Ok(Wav {
            format,
            data: data.data,
            data_offset: data.data_offset(),
        })
    }

    fn data_range(&self) -> Range<usize> {
        self.data_offset..self.data_offset + self.data.len()
    }
}

/// An immutable PCM clip.
///
/// The clip owns the file it was loaded from. Cloning shares the buffer.
#[derive(Clone)]
pub struct Clip {
    /// Display name, usually the file stem.
    name: Arc<str>,
    /// The whole file.
    bytes: Arc<[u8]>,
    /// Where the PCM payload sits in `bytes`.
    data: Range<usize>,
    /// The parsed `fmt ` chunk.
    format: FormatDescriptor,
}

impl Clip {
    /// Builds a clip from a complete WAV file.
    pub fn from_bytes(name: impl Into<Arc<str>>, bytes: Arc<[u8]>) -> Result<Clip, LoadError> {
        let (format, data) = {
            let wav = Wav::parse(&bytes)?;
            (wav.format, wav.data_range())
        };

        Ok(Clip {
            name: name.into(),
            bytes,
            data,
            format,
        })
    }

    /// Reads and parses a WAV file from disk.
    pub fn load(path: &Path) -> Result<Clip, LoadError> {
        let bytes: Arc<[u8]> = fs::read(path)?.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Clip::from_bytes(name, bytes)
    }

    /// Returns the clip name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the format descriptor.
    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    /// Returns the raw PCM payload.
    pub fn data(&self) -> &[u8] {
        &self.bytes[self.data.clone()]
    }

    /// Returns the payload length in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the playback duration implied by the format, if the format is usable.
    pub fn duration(&self) -> Option<Duration> {
        let block_align = self.format.block_align as u64;
        if block_align == 0 || self.format.sample_rate == 0 {
            return None;
        }
        let frames = self.byte_len() as u64 / block_align;
        Some(Duration::from_secs_f64(
            frames as f64 / self.format.sample_rate as f64,
        ))
    }

    /// Returns true if both clips share the same file buffer.
    #[cfg(test)]
    pub fn shares_buffer(&self, other: &Clip) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("name", &self.name)
            .field("bytes", &self.byte_len())
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fmt_chunk, riff, write_wav};

    fn incomplete(bytes: &[u8]) -> Option<Incomplete> {
        match Wav::parse(bytes) {
            Err(LoadError::IncompleteWavFile(reason)) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn test_parse_fmt_and_data() {
        let fmt = fmt_chunk(2, 44100, 16);
        let bytes = riff(b"WAVE", &[(b"fmt ", &fmt), (b"data", &[1, 2, 3, 4])]);

        let wav = Wav::parse(&bytes).unwrap();
        assert_eq!(wav.format.format_tag, FORMAT_PCM);
        assert_eq!(wav.format.channels, 2);
        assert_eq!(wav.format.sample_rate, 44100);
        assert_eq!(wav.format.avg_bytes_per_sec, 44100 * 4);
        assert_eq!(wav.format.block_align, 4);
        assert_eq!(wav.format.bits_per_sample, 16);
        assert_eq!(wav.data, &[1, 2, 3, 4]);
        assert_eq!(wav.data_offset, 12 + 8 + 16 + 8);
    }

    #[test]
    fn test_chunk_order_does_not_matter() {
        let fmt = fmt_chunk(1, 22050, 8);
        let bytes = riff(
            b"WAVE",
            &[(b"data", &[9, 8, 7]), (b"LIST", &[0; 10]), (b"fmt ", &fmt)],
        );

        let wav = Wav::parse(&bytes).unwrap();
        assert_eq!(wav.format.sample_rate, 22050);
        assert_eq!(wav.format.channels, 1);
        assert_eq!(wav.data, &[9, 8, 7]);
        assert_eq!(wav.data_offset, 20);
    }

    #[test]
    fn test_missing_chunks() {
        let fmt = fmt_chunk(2, 44100, 16);

        let fmt_only = riff(b"WAVE", &[(b"fmt ", &fmt)]);
        assert_eq!(incomplete(&fmt_only), Some(Incomplete::MissingData));

        let data_only = riff(b"WAVE", &[(b"data", &[0; 4])]);
        assert_eq!(incomplete(&data_only), Some(Incomplete::MissingFormat));

        let short_fmt = riff(b"WAVE", &[(b"fmt ", &fmt[..14]), (b"data", &[0; 4])]);
        assert_eq!(
            incomplete(&short_fmt),
            Some(Incomplete::TruncatedFormat(14))
        );

        let empty_data = riff(b"WAVE", &[(b"fmt ", &fmt), (b"data", &[])]);
        assert_eq!(incomplete(&empty_data), Some(Incomplete::EmptyData));
    }

    #[test]
    fn test_malformed_container() {
        let fmt = fmt_chunk(2, 44100, 16);
        let bytes = riff(b"AVI ", &[(b"fmt ", &fmt), (b"data", &[0; 4])]);
        assert!(matches!(
            Wav::parse(&bytes),
            Err(LoadError::MalformedContainer(
                ContainerError::WrongFormType { .. }
            ))
        ));
    }

    #[test]
    fn test_nonsense_format_is_tolerated() {
        let mut fmt = fmt_chunk(2, 44100, 16);
        fmt[4..8].copy_from_slice(&0u32.to_le_bytes());
        fmt[12..14].copy_from_slice(&0u16.to_le_bytes());
        let bytes: Arc<[u8]> = riff(b"WAVE", &[(b"fmt ", &fmt), (b"data", &[0; 4])]).into();

        let clip = Clip::from_bytes("weird", bytes).unwrap();
        assert_eq!(clip.format().sample_rate, 0);
        assert_eq!(clip.duration(), None);
    }

    #[test]
    fn test_later_duplicate_chunk_wins() {
        let first = fmt_chunk(1, 8000, 8);
        let second = fmt_chunk(2, 48000, 16);
        let bytes = riff(
            b"WAVE",
            &[
                (b"fmt ", &first),
                (b"data", &[1]),
                (b"fmt ", &second),
                (b"data", &[2, 2]),
            ],
        );

        let wav = Wav::parse(&bytes).unwrap();
        assert_eq!(wav.format.sample_rate, 48000);
        assert_eq!(wav.data, &[2, 2]);
    }

    #[test]
    fn test_clip_views_file_buffer() {
        let fmt = fmt_chunk(2, 44100, 16);
        let data = [5, 6, 7, 8, 9, 10, 11, 12];
        let bytes = riff(b"WAVE", &[(b"fmt ", &fmt), (b"data", &data)]);
        let bytes: Arc<[u8]> = bytes.into();

        let clip = Clip::from_bytes("1e-1", bytes.clone()).unwrap();
        assert_eq!(clip.name(), "1e-1");
        assert_eq!(clip.data(), &[5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(clip.byte_len(), 8);
        assert_eq!(clip.data().as_ptr(), bytes[44..].as_ptr());

        let clone = clip.clone();
        assert!(clone.shares_buffer(&clip));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1e-1.wav");
        write_wav(&path, 2, 44100, &[0i16; 441 * 2]).unwrap();

        let clip = Clip::load(&path).unwrap();
        assert_eq!(clip.name(), "1e-1");
        assert_eq!(clip.format().channels, 2);
        assert_eq!(clip.format().bits_per_sample, 16);
        assert_eq!(clip.byte_len(), 441 * 4);
        assert_eq!(clip.duration(), Some(Duration::from_millis(10)));

        let missing = Clip::load(&dir.path().join("nope.wav")).unwrap_err();
        assert!(missing.is_not_found());
    }
}
