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

//! The key-edge trigger engine.
//!
//! Each key is either up or down, starting up. An event only counts when it
//! moves its key to the other state: a repeated press while already down, or a
//! release while already up, is dropped. Accepted edges look up the clip for
//! that key and edge and hand it to the channel pool.

use std::{io, thread};

use crossbeam_channel::{select, Receiver};
use tracing::{debug, info, span, Level};

use crate::audio::{thread_priority, ChannelPool};
use crate::bank::{Edge, KeyId, SoundBank, NUM_KEYS};
use crate::input::KeyEvent;

/// What the engine did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The code is outside the key domain.
    OutOfRange,
    /// The key was already in the reported state.
    Repeat,
    /// The edge was accepted but no clip is bound to it.
    Unbound,
    /// The edge was accepted and its clip handed to the pool.
    Triggered,
}

/// Pressed state for every key.
pub struct KeyStates {
    pressed: [bool; NUM_KEYS],
}

impl KeyStates {
    pub fn new() -> KeyStates {
        KeyStates {
            pressed: [false; NUM_KEYS],
        }
    }

    #[cfg(test)]
    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.pressed[key.index()]
    }

    /// Records the new state. Returns the edge if the state changed.
    #[inline]
    pub fn transition(&mut self, key: KeyId, down: bool) -> Option<Edge> {
        let pressed = &mut self.pressed[key.index()];
        if *pressed == down {
            return None;
        }
        *pressed = down;
        Some(Edge::from_pressed(down))
    }
}

impl Default for KeyStates {
    fn default() -> Self {
        KeyStates::new()
    }
}

/// Counters kept by the engine thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events: u64,
    pub triggered: u64,
    pub unbound: u64,
    pub repeats: u64,
    pub out_of_range: u64,
}

impl EngineStats {
    fn record(&mut self, outcome: Outcome) {
        self.events += 1;
        match outcome {
            Outcome::OutOfRange => self.out_of_range += 1,
            Outcome::Repeat => self.repeats += 1,
            Outcome::Unbound => self.unbound += 1,
            Outcome::Triggered => self.triggered += 1,
        }
    }
}

/// Everything the engine owns: the bank, the key states and the channel pool.
pub struct SoundboardState {
    bank: SoundBank,
    keys: KeyStates,
    pool: ChannelPool,
}

impl SoundboardState {
    pub fn new(bank: SoundBank, pool: ChannelPool) -> SoundboardState {
        SoundboardState {
            bank,
            keys: KeyStates::new(),
            pool,
        }
    }

    /// Handles one key event. Never blocks.
    pub fn handle(&mut self, event: KeyEvent) -> Outcome {
        let Some(key) = KeyId::from_code(event.code) else {
            return Outcome::OutOfRange;
        };
        let Some(edge) = self.keys.transition(key, event.down) else {
            return Outcome::Repeat;
        };
        let Some(clip) = self.bank.get(key, edge) else {
            return Outcome::Unbound;
        };

        debug!(key = %key, edge = %edge, clip = clip.name(), "Trigger");
        self.pool.trigger(key, clip);
        Outcome::Triggered
    }

    #[cfg(test)]
    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.keys.is_pressed(key)
    }

    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    /// Closes the output channels.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

/// Runs the engine on its own thread. Events are handled in the order they were
/// queued until every sender is gone or `shutdown` fires. The pool is closed on exit.
pub fn spawn(
    mut state: SoundboardState,
    events: Receiver<KeyEvent>,
    shutdown: Receiver<()>,
) -> io::Result<thread::JoinHandle<EngineStats>> {
    thread::Builder::new()
        .name("trigger-engine".to_string())
        .spawn(move || {
            let span = span!(Level::INFO, "trigger engine");
            let _enter = span.enter();

            thread_priority::raise_current_thread(
                "trigger engine",
                thread_priority::thread_priority(thread_priority::DEFAULT_ENGINE_PRIORITY),
                thread_priority::rt_enabled(),
            );
            info!(
                keys = state.bank().keys().count(),
                channels = state.pool().channel_count(),
                "Trigger engine started."
            );

            let mut stats = EngineStats::default();
            loop {
                select! {
                    recv(events) -> event => match event {
                        Ok(event) => stats.record(state.handle(event)),
                        Err(_) => {
                            info!("All key event sources closed.");
                            break;
                        }
                    },
                    recv(shutdown) -> _ => break,
                }
            }

            state.shutdown();
            info!(
                events = stats.events,
                triggered = stats.triggered,
                repeats = stats.repeats,
                unbound = stats.unbound,
                out_of_range = stats.out_of_range,
                "Trigger engine stopped."
            );
            stats
        })
}
