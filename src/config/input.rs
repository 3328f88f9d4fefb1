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
use serde::Deserialize;

const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// A key event source.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// Line oriented events on standard input.
    Stdin,
    /// Note on/off from a MIDI input port.
    Midi {
        /// Substring of the MIDI input port name.
        device: String,
    },
}

/// A YAML representation of the input configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Input {
    /// Capacity of the queue between the sources and the trigger engine.
    queue_depth: Option<usize>,

    /// Where key events come from (default: stdin).
    sources: Option<Vec<Source>>,
}

impl Input {
    /// Returns the event queue depth (default: 1024, never less than 1).
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH).max(1)
    }

    /// Returns the configured sources.
    pub fn sources(&self) -> Vec<Source> {
        match &self.sources {
            Some(sources) => sources.clone(),
            None => vec![Source::Stdin],
        }
    }
}
