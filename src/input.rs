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

//! Key event sources and the queue that carries their events to the trigger engine.

use std::io;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, TrySendError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config;

pub mod midi;
pub mod stdin;

/// A key transition as reported by a source. Repeats are passed through as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Raw key code. Codes outside the key domain are dropped by the engine.
    pub code: u32,
    /// True for a press, false for a release.
    pub down: bool,
}

impl KeyEvent {
    pub fn down(code: u32) -> KeyEvent {
        KeyEvent { code, down: true }
    }

    pub fn up(code: u32) -> KeyEvent {
        KeyEvent { code, down: false }
    }
}

/// The producer side of the engine queue. Sending never blocks: when the
/// queue is full the event is dropped.
#[derive(Clone)]
pub struct EventSender {
    tx: crossbeam_channel::Sender<KeyEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Offers an event to the engine. Returns false once the engine has gone away.
    pub fn send(&self, event: KeyEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    code = event.code,
                    down = event.down,
                    dropped,
                    "Event queue full, dropping key event"
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Returns how many events were dropped because the queue was full.
    #[cfg(test)]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Creates the bounded queue between the sources and the engine.
pub fn queue(depth: usize) -> (EventSender, Receiver<KeyEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    (
        EventSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

/// A source of key events.
pub trait Driver: Send + Sync + 'static {
    /// Starts pushing events. The returned task finishes when the source ends
    /// or the engine stops listening.
    fn monitor_events(&self, events: EventSender) -> JoinHandle<Result<(), io::Error>>;
}

/// Creates the driver for a configured source.
pub fn driver(source: &config::Source) -> Arc<dyn Driver> {
    match source {
        config::Source::Stdin => Arc::new(stdin::Driver::new()),
        config::Source::Midi { device } => Arc::new(midi::Driver::new(device)),
    }
}
