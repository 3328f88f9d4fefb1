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

//! The sound bank: one optional clip per key and edge.
//!
//! Sound files live in a single directory and are named `<kk>-<e>.wav`, where
//! `kk` is the key identity as two lowercase hex digits and `e` is `1` for the
//! clip played on key-down and `0` for the clip played on key-up. Every file is
//! loaded into memory at startup; a slot whose file is missing or unusable is
//! simply left empty.

use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::audio::OutputFormat;
use crate::wav::Clip;

/// Number of distinct key identities.
pub const NUM_KEYS: usize = 256;

/// A key identity in the bounded key domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u8);

impl KeyId {
    pub const fn new(id: u8) -> KeyId {
        KeyId(id)
    }

    /// Converts a raw key code, rejecting codes outside the key domain.
    pub fn from_code(code: u32) -> Option<KeyId> {
        u8::try_from(code).ok().map(KeyId::new)
    }

    /// Returns the table index for this key.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterates over every key identity in order.
    pub fn all() -> impl Iterator<Item = KeyId> {
        (0..=u8::MAX).map(KeyId)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// A key transition direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    Down,
    Up,
}

impl Edge {
    pub const ALL: [Edge; 2] = [Edge::Down, Edge::Up];

    /// The edge that leads into the given pressed state.
    pub fn from_pressed(pressed: bool) -> Edge {
        if pressed {
            Edge::Down
        } else {
            Edge::Up
        }
    }

    /// The digit used in sound file names. Matches the pressed flag.
    pub fn file_digit(self) -> u8 {
        match self {
            Edge::Down => 1,
            Edge::Up => 0,
        }
    }

    fn index(self) -> usize {
        self.file_digit() as usize
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Down => write!(f, "down"),
            Edge::Up => write!(f, "up"),
        }
    }
}

/// Returns the file name for a slot, e.g. `1e-1.wav` for key 0x1e going down.
pub fn slot_file_name(key: KeyId, edge: Edge) -> String {
    format!("{}-{}.wav", key, edge.file_digit())
}

/// A loaded clip whose format doesn't match the output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatMismatch {
    pub key: KeyId,
    pub edge: Edge,
    pub clip: String,
    pub found: String,
}

/// Fixed table of clips indexed by key and edge.
pub struct SoundBank {
    slots: Box<[[Option<Clip>; 2]; NUM_KEYS]>,
}

impl SoundBank {
    /// Creates a bank with every slot empty.
    pub fn empty() -> SoundBank {
        SoundBank {
            slots: Box::new(std::array::from_fn(|_| [None, None])),
        }
    }

    /// Loads every slot from the given directory. Loading never fails as a whole:
    /// missing files leave their slot empty and unusable files are logged and skipped.
    pub fn load(dir: &Path) -> SoundBank {
        if !dir.is_dir() {
            warn!(dir = ?dir, "Sound directory does not exist, no sounds will play");
            return SoundBank::empty();
        }

        let slots: Vec<(KeyId, Edge)> = KeyId::all()
            .flat_map(|key| Edge::ALL.map(|edge| (key, edge)))
            .collect();

        let loaded: Vec<(KeyId, Edge, Clip)> = slots
            .into_par_iter()
            .filter_map(|(key, edge)| {
                let path = slot_path(dir, key, edge);
                match Clip::load(&path) {
                    Ok(clip) => {
                        debug!(
                            path = ?path,
                            bytes = clip.byte_len(),
                            sample_rate = clip.format().sample_rate,
                            bits = clip.format().bits_per_sample,
                            channels = clip.format().channels,
                            "Sound loaded"
                        );
                        Some((key, edge, clip))
                    }
                    Err(e) if e.is_not_found() => None,
                    Err(e) => {
                        warn!(path = ?path, err = %e, "Ignoring unusable sound file");
                        None
                    }
                }
            })
            .collect();

        let mut bank = SoundBank::empty();
        for (key, edge, clip) in loaded {
            bank.insert(key, edge, clip);
        }

        info!(
            dir = ?dir,
            clips = bank.len(),
            keys = bank.keys().count(),
            total_bytes = bank.total_bytes(),
            "Sound bank loaded"
        );

        bank
    }

    /// Places a clip in a slot, returning whatever was there before.
    pub fn insert(&mut self, key: KeyId, edge: Edge, clip: Clip) -> Option<Clip> {
        self.slots[key.index()][edge.index()].replace(clip)
    }

    /// Returns the clip bound to the given slot.
    #[inline]
    pub fn get(&self, key: KeyId, edge: Edge) -> Option<&Clip> {
        self.slots[key.index()][edge.index()].as_ref()
    }

    /// Returns true if either edge of the key has a clip.
    pub fn has_any(&self, key: KeyId) -> bool {
        self.slots[key.index()].iter().any(Option::is_some)
    }

    /// Iterates over the keys that have at least one clip.
    pub fn keys(&self) -> impl Iterator<Item = KeyId> + '_ {
        KeyId::all().filter(|key| self.has_any(*key))
    }

    /// Iterates over every loaded slot in key order, down before up.
    pub fn iter(&self) -> impl Iterator<Item = (KeyId, Edge, &Clip)> + '_ {
        KeyId::all().flat_map(move |key| {
            Edge::ALL
                .into_iter()
                .filter_map(move |edge| self.get(key, edge).map(|clip| (key, edge, clip)))
        })
    }

    /// Returns the number of loaded clips.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if no clips are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total PCM payload size of every loaded clip.
    pub fn total_bytes(&self) -> usize {
        self.iter().map(|(_, _, clip)| clip.byte_len()).sum()
    }

    /// Lists the clips that will not play back faithfully in the given output format.
    pub fn format_mismatches(&self, format: &OutputFormat) -> Vec<FormatMismatch> {
        self.iter()
            .filter(|(_, _, clip)| !format.accepts(clip.format()))
            .map(|(key, edge, clip)| FormatMismatch {
                key,
                edge,
                clip: clip.name().to_string(),
                found: clip.format().to_string(),
            })
            .collect()
    }
}

impl Default for SoundBank {
    fn default() -> Self {
        SoundBank::empty()
    }
}

impl fmt::Debug for SoundBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundBank")
            .field("clips", &self.len())
            .field("total_kb", &(self.total_bytes() / 1024))
            .finish()
    }
}

/// Returns the path a slot is loaded from.
pub fn slot_path(dir: &Path, key: KeyId, edge: Edge) -> PathBuf {
    dir.join(slot_file_name(key, edge))
}
