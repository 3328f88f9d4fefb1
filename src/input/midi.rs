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
use std::{error::Error, io};

use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use midly::{live::LiveEvent, MidiMessage};
use tokio::task::JoinHandle;
use tracing::{debug, info, span, Level};

use super::{EventSender, KeyEvent};

/// Translates a raw MIDI message into a key event. The note number is the key
/// code; a note on with zero velocity counts as a release.
pub fn key_event_from_midi(raw: &[u8]) -> Option<KeyEvent> {
    match LiveEvent::parse(raw).ok()? {
        LiveEvent::Midi { message, .. } => match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                Some(KeyEvent::down(u32::from(key.as_int())))
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                Some(KeyEvent::up(u32::from(key.as_int())))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Lists the names of the MIDI input ports.
pub fn list_ports() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new("clackboard input listing")?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Finds the one input port whose name contains the given name.
fn find_port(input: &MidiInput, name: &str) -> Result<MidiInputPort, Box<dyn Error>> {
    let mut matches = Vec::new();
    for port in input.ports() {
        let port_name = input.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }

    if matches.is_empty() {
        return Err(format!("no MIDI input found with name {}", name).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many MIDI inputs that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|(port_name, _)| port_name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }

    Ok(matches.swap_remove(0).1)
}

/// A driver that turns MIDI notes into key events. It only notices that the
/// engine has stopped when the next note arrives, so it never ends a run by
/// itself.
pub struct Driver {
    /// Substring of the input port name.
    device: String,
}

impl Driver {
    pub fn new(device: &str) -> Driver {
        Driver {
            device: device.to_string(),
        }
    }

    /// Connects to the port. The connection forwards events until it is dropped and
    /// signals `done` once the engine stops listening.
    fn connect(
        device: &str,
        events: EventSender,
        done: crossbeam_channel::Sender<()>,
    ) -> Result<MidiInputConnection<()>, Box<dyn Error>> {
        let input = MidiInput::new("clackboard input")?;
        let port = find_port(&input, device)?;
        let port_name = input.port_name(&port)?;

        let connection = input.connect(
            &port,
            "clackboard key watcher",
            move |_, raw, _| {
                if let Some(event) = key_event_from_midi(raw) {
                    debug!(
                        code = event.code,
                        down = event.down,
                        "Received MIDI key event."
                    );
                    if !events.send(event) {
                        let _ = done.try_send(());
                    }
                }
            },
            (),
        )?;

        info!(port = port_name, "Watching MIDI input.");
        Ok(connection)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events: EventSender) -> JoinHandle<Result<(), io::Error>> {
        let device = self.device.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "MIDI driver", device = device.as_str());
            let _enter = span.enter();

            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
            let connection = Self::connect(&device, events, done_tx)
                .map_err(|e| io::Error::other(e.to_string()))?;

            info!("MIDI driver started.");
            let _ = done_rx.recv();

            info!("Trigger engine stopped, closing MIDI input.");
            connection.close();
            Ok(())
        })
    }
}
