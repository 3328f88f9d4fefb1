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
use std::io;

use tokio::task::JoinHandle;
use tracing::{info, span, warn, Level};

use super::{EventSender, KeyEvent};

const DOWN: &str = "down";
const UP: &str = "up";

/// Why a line of input isn't a key event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("unknown edge {0:?}, expected down or up")]
    UnknownEdge(String),

    #[error("missing key code")]
    MissingCode,

    #[error("invalid key code {0:?}")]
    BadCode(String),

    #[error("unexpected trailing input {0:?}")]
    Trailing(String),
}

/// Parses one line of the form `<edge> <code>`.
///
/// The edge is `down`/`d` or `up`/`u`. The code is hex like the sound file
/// names (`1e`, `0x1e`) or decimal with a `#` prefix (`#30`). Blank lines yield
/// no event.
pub fn parse_line(line: &str) -> Result<Option<KeyEvent>, LineError> {
    let mut words = line.split_whitespace();
    let Some(edge) = words.next() else {
        return Ok(None);
    };

    let down = match edge.to_lowercase().as_str() {
        DOWN | "d" => true,
        UP | "u" => false,
        _ => return Err(LineError::UnknownEdge(edge.to_string())),
    };

    let code = words.next().ok_or(LineError::MissingCode)?;
    if let Some(rest) = words.next() {
        return Err(LineError::Trailing(rest.to_string()));
    }

    let parsed = match code.strip_prefix('#') {
        Some(decimal) => decimal.parse::<u32>(),
        None => {
            let hex = code
                .strip_prefix("0x")
                .or_else(|| code.strip_prefix("0X"))
                .unwrap_or(code);
            u32::from_str_radix(hex, 16)
        }
    };
    let code = parsed.map_err(|_| LineError::BadCode(code.to_string()))?;

    Ok(Some(KeyEvent { code, down }))
}

/// A driver that reads key events from standard input, one per line.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Forwards events until the reader is exhausted or the engine stops listening.
    fn monitor_io<R>(events: &EventSender, reader: R) -> Result<(), io::Error>
    where
        R: io::BufRead,
    {
        for line in reader.lines() {
            let line = line?;
            match parse_line(&line) {
                Ok(Some(event)) => {
                    if !events.send(event) {
                        info!("Trigger engine stopped, no longer reading input.");
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(input = line, err = %e, "Unrecognized input"),
            }
        }

        info!("End of input.");
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events: EventSender) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "stdin driver");
            let _enter = span.enter();

            info!("Stdin driver started.");
            Self::monitor_io(&events, io::stdin().lock())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::BufReader;

    use super::*;
    use crate::input::queue;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("down 1e"), Ok(Some(KeyEvent::down(0x1e))));
        assert_eq!(parse_line("  up 0x1E  "), Ok(Some(KeyEvent::up(0x1e))));
        assert_eq!(parse_line("D ff"), Ok(Some(KeyEvent::down(0xff))));
        assert_eq!(parse_line("u #30"), Ok(Some(KeyEvent::up(30))));
        assert_eq!(parse_line("down 1ff"), Ok(Some(KeyEvent::down(0x1ff))));
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));

        assert_eq!(
            parse_line("press 1e"),
            Err(LineError::UnknownEdge("press".to_string()))
        );
        assert_eq!(parse_line("down"), Err(LineError::MissingCode));
        assert_eq!(
            parse_line("down zz"),
            Err(LineError::BadCode("zz".to_string()))
        );
        assert_eq!(
            parse_line("down #1e"),
            Err(LineError::BadCode("#1e".to_string()))
        );
        assert_eq!(
            parse_line("down 1e now"),
            Err(LineError::Trailing("now".to_string()))
        );
    }

    #[test]
    fn test_monitor_io_skips_bad_lines() -> Result<(), io::Error> {
        let (events, rx) = queue(16);
        let input = "down 1e\nbogus\n\nup 1e\ndown 300\n";
        Driver::monitor_io(&events, BufReader::new(input.as_bytes()))?;

        let received: Vec<KeyEvent> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                KeyEvent::down(0x1e),
                KeyEvent::up(0x1e),
                KeyEvent::down(0x300)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_monitor_io_stops_when_engine_gone() -> Result<(), io::Error> {
        let (events, rx) = queue(16);
        drop(rx);
        Driver::monitor_io(&events, BufReader::new("down 1\ndown 2\n".as_bytes()))?;
        Ok(())
    }
}
