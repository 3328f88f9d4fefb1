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

//! RIFF container walking.
//!
//! A RIFF file is a 12 byte header (`RIFF`, a little-endian size, a form type)
//! followed by a sequence of sibling chunks. Each chunk is a four character
//! identifier, a little-endian payload length and the payload, padded to an
//! even length. The walker validates the framing and hands each chunk to a
//! visitor as a view into the caller's buffer.

use std::fmt;

/// Length of the outer `RIFF` header.
pub const HEADER_LEN: usize = 12;

/// Length of a chunk header (identifier plus length).
const CHUNK_HEADER_LEN: usize = 8;

/// Offset the declared outer size is measured from.
const SIZE_BASE: usize = 8;

/// A four character code, as used for chunk identifiers and form types.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const RIFF: FourCC = FourCC(*b"RIFF");
    pub const WAVE: FourCC = FourCC(*b"WAVE");
    pub const FMT: FourCC = FourCC(*b"fmt ");
    pub const DATA: FourCC = FourCC(*b"data");

    /// Reads a code at the given offset. The caller guarantees four bytes are available.
    fn read(bytes: &[u8], at: usize) -> FourCC {
        FourCC([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

/// A single chunk, borrowed from the buffer being walked.
#[derive(Clone, Copy, Debug)]
pub struct Chunk<'a> {
    /// The chunk identifier.
    pub id: FourCC,
    /// Offset of the chunk header from the start of the buffer.
    pub offset: usize,
    /// The chunk payload, without the pad byte.
    pub data: &'a [u8],
}

impl Chunk<'_> {
    /// Offset of the payload from the start of the buffer.
    pub fn data_offset(&self) -> usize {
        self.offset + CHUNK_HEADER_LEN
    }
}

/// What the walker should do after a chunk has been visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Abort,
}

/// Receives every chunk of a container in file order.
pub trait ChunkVisitor<'a> {
    fn visit(&mut self, chunk: Chunk<'a>) -> Visit;
}

impl<'a, F> ChunkVisitor<'a> for F
where
    F: FnMut(Chunk<'a>) -> Visit,
{
    fn visit(&mut self, chunk: Chunk<'a>) -> Visit {
        self(chunk)
    }
}

/// Structural problems with a RIFF container.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("{len} bytes is too short for a RIFF header")]
    TooShort { len: usize },

    #[error("not a RIFF file (found {found})")]
    NotRiff { found: FourCC },

    #[error("form type is {found}, expected {expected}")]
    WrongFormType { expected: FourCC, found: FourCC },

    #[error("declared size {declared} exceeds the {available} bytes available")]
    SizeOverrun { declared: u32, available: usize },

    #[error("truncated chunk header at offset {offset}")]
    TruncatedHeader { offset: usize },

    #[error("chunk {id} at offset {offset} extends past the end of the container")]
    ChunkOverrun { id: FourCC, offset: usize },

    #[error("chunk walk ended at offset {offset}, past the declared end {end}")]
    Overshoot { offset: usize, end: usize },

    #[error("chunk {id} at offset {offset} was rejected")]
    Rejected { id: FourCC, offset: usize },
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Walks the chunks of a RIFF container with the given form type.
///
/// The outer framing is checked before any chunk is visited, so a buffer that
/// fails the header checks never reaches the visitor. Chunks are bounds checked
/// against the declared size before they are handed out. A visitor returning
/// [`Visit::Abort`] fails the whole walk.
pub fn walk<'a, V>(
    bytes: &'a [u8],
    form_type: FourCC,
    visitor: &mut V,
) -> Result<(), ContainerError>
where
    V: ChunkVisitor<'a> + ?Sized,
{
    if bytes.len() < HEADER_LEN {
        return Err(ContainerError::TooShort { len: bytes.len() });
    }

    let magic = FourCC::read(bytes, 0);
    if magic != FourCC::RIFF {
        return Err(ContainerError::NotRiff { found: magic });
    }

    let found = FourCC::read(bytes, 8);
    if found != form_type {
        return Err(ContainerError::WrongFormType {
            expected: form_type,
            found,
        });
    }

    let declared = read_u32(bytes, 4);
    let available = bytes.len() - SIZE_BASE;
    if declared as usize > available {
        return Err(ContainerError::SizeOverrun {
            declared,
            available,
        });
    }

    // The declared size counts the form type, so chunks run from the end of the
    // header up to SIZE_BASE + declared.
    let end = SIZE_BASE + declared as usize;
    let mut offset = HEADER_LEN;
    while offset < end {
        if end - offset < CHUNK_HEADER_LEN {
            return Err(ContainerError::TruncatedHeader { offset });
        }

        let id = FourCC::read(bytes, offset);
        let len = read_u32(bytes, offset + 4) as usize;
        let start = offset + CHUNK_HEADER_LEN;
        if len > end - start {
            return Err(ContainerError::ChunkOverrun { id, offset });
        }

        let chunk = Chunk {
            id,
            offset,
            data: &bytes[start..start + len],
        };
        if visitor.visit(chunk) == Visit::Abort {
            return Err(ContainerError::Rejected { id, offset });
        }

        // Odd-sized chunks are followed by a pad byte.
        offset = start + len + (len & 1);
    }

    if offset != end {
        return Err(ContainerError::Overshoot { offset, end });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::riff;

    fn visited(bytes: &[u8]) -> Result<Vec<(FourCC, usize)>, ContainerError> {
        let mut seen = Vec::new();
        walk(bytes, FourCC::WAVE, &mut |chunk: Chunk| {
            seen.push((chunk.id, chunk.data.len()));
            Visit::Continue
        })?;
        Ok(seen)
    }

    #[test]
    fn test_visits_every_chunk_in_order() {
        let bytes = riff(
            b"WAVE",
            &[
                (b"fmt ", &[0u8; 16]),
                (b"LIST", &[1u8; 5]),
                (b"data", &[2u8; 7]),
                (b"cue ", &[]),
            ],
        );

        let seen = visited(&bytes).unwrap();
        assert_eq!(
            seen,
            vec![
                (FourCC(*b"fmt "), 16),
                (FourCC(*b"LIST"), 5),
                (FourCC(*b"data"), 7),
                (FourCC(*b"cue "), 0),
            ]
        );

        // The declared size covers the form type plus every padded chunk.
        let declared = read_u32(&bytes, 4) as usize;
        let covered: usize = seen.iter().map(|(_, len)| 8 + len + (len & 1)).sum();
        assert_eq!(declared, 4 + covered);
    }

    #[test]
    fn test_payload_views_point_into_buffer() {
        let bytes = riff(b"WAVE", &[(b"abcd", &[9, 8, 7]), (b"efgh", &[6, 5])]);

        let mut offsets = Vec::new();
        walk(&bytes, FourCC::WAVE, &mut |chunk: Chunk| {
            assert_eq!(
                &bytes[chunk.data_offset()..chunk.data_offset() + chunk.data.len()],
                chunk.data
            );
            offsets.push(chunk.offset);
            Visit::Continue
        })
        .unwrap();

        // 3 byte payload plus a pad byte puts the second header at 12 + 8 + 4.
        assert_eq!(offsets, vec![12, 24]);
    }

    #[test]
    fn test_empty_container() {
        let bytes = riff(b"WAVE", &[]);
        assert_eq!(visited(&bytes).unwrap(), vec![]);
    }

    #[test]
    fn test_header_failures_never_visit() {
        let good = riff(b"WAVE", &[(b"data", &[0u8; 4])]);

        let mut not_riff = good.clone();
        not_riff[..4].copy_from_slice(b"RIFX");

        let mut wrong_form = good.clone();
        wrong_form[8..12].copy_from_slice(b"AVI ");

        let mut oversized = good.clone();
        oversized[4..8].copy_from_slice(&(good.len() as u32).to_le_bytes());

        let cases: Vec<(&[u8], ContainerError)> = vec![
            (&good[..0], ContainerError::TooShort { len: 0 }),
            (&good[..11], ContainerError::TooShort { len: 11 }),
            (
                &not_riff[..],
                ContainerError::NotRiff {
                    found: FourCC(*b"RIFX"),
                },
            ),
            (
                &wrong_form[..],
                ContainerError::WrongFormType {
                    expected: FourCC::WAVE,
                    found: FourCC(*b"AVI "),
                },
            ),
            (
                &oversized[..],
                ContainerError::SizeOverrun {
                    declared: good.len() as u32,
                    available: good.len() - 8,
                },
            ),
        ];

        for (bytes, expected) in cases {
            let mut calls = 0;
            let result = walk(bytes, FourCC::WAVE, &mut |_: Chunk| {
                calls += 1;
                Visit::Continue
            });
            assert_eq!(result, Err(expected));
            assert_eq!(calls, 0);
        }
    }

    #[test]
    fn test_trailing_bytes_past_declared_size_are_ignored() {
        let mut bytes = riff(b"WAVE", &[(b"data", &[1u8; 2])]);
        bytes.extend_from_slice(b"junkjunkjunk");
        assert_eq!(visited(&bytes).unwrap(), vec![(FourCC::DATA, 2)]);
    }

    #[test]
    fn test_chunk_overrun() {
        let mut bytes = riff(b"WAVE", &[(b"data", &[0u8; 4])]);
        // Claim a payload longer than the container.
        bytes[16..20].copy_from_slice(&100u32.to_le_bytes());
        assert_eq!(
            visited(&bytes),
            Err(ContainerError::ChunkOverrun {
                id: FourCC::DATA,
                offset: 12
            })
        );
    }

    #[test]
    fn test_truncated_chunk_header() {
        let mut bytes = riff(b"WAVE", &[(b"data", &[0u8; 2])]);
        bytes.extend_from_slice(&[b'x', b'y', b'z', b'w']);
        let declared = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&declared.to_le_bytes());
        assert_eq!(
            visited(&bytes),
            Err(ContainerError::TruncatedHeader { offset: 22 })
        );
    }

    #[test]
    fn test_missing_pad_byte_overshoots() {
        let mut bytes = riff(b"WAVE", &[(b"data", &[0u8; 3])]);
        // Drop the pad byte from the declared size only.
        let declared = (bytes.len() - 8 - 1) as u32;
        bytes[4..8].copy_from_slice(&declared.to_le_bytes());

        let mut calls = 0;
        let result = walk(&bytes, FourCC::WAVE, &mut |_: Chunk| {
            calls += 1;
            Visit::Continue
        });
        assert_eq!(
            result,
            Err(ContainerError::Overshoot {
                offset: 24,
                end: 23
            })
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_undersized_declaration() {
        let mut bytes = riff(b"WAVE", &[]);
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            visited(&bytes),
            Err(ContainerError::Overshoot { offset: 12, end: 8 })
        );
    }

    #[test]
    fn test_abort_stops_the_walk() {
        let bytes = riff(
            b"WAVE",
            &[(b"fmt ", &[0u8; 16]), (b"bad!", &[]), (b"data", &[0u8; 2])],
        );

        let mut seen = Vec::new();
        let result = walk(&bytes, FourCC::WAVE, &mut |chunk: Chunk| {
            seen.push(chunk.id);
            if chunk.id == FourCC(*b"bad!") {
                Visit::Abort
            } else {
                Visit::Continue
            }
        });

        assert_eq!(
            result,
            Err(ContainerError::Rejected {
                id: FourCC(*b"bad!"),
                offset: 36
            })
        );
        assert_eq!(seen, vec![FourCC::FMT, FourCC(*b"bad!")]);
    }

    #[test]
    fn test_struct_visitor() {
        struct Counter(usize);
        impl<'a> ChunkVisitor<'a> for Counter {
            fn visit(&mut self, _: Chunk<'a>) -> Visit {
                self.0 += 1;
                Visit::Continue
            }
        }

        let bytes = riff(b"WAVE", &[(b"a   ", &[]), (b"b   ", &[1])]);
        let mut counter = Counter(0);
        walk(&bytes, FourCC::WAVE, &mut counter).unwrap();
        assert_eq!(counter.0, 2);
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::FMT.to_string(), "fmt ");
        assert_eq!(FourCC([0, b'a', 0xff, b'b']).to_string(), "?a?b");
    }
}
