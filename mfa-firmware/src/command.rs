//! Serial command parser
//!
//! Line-based ASCII protocol at 115200 baud, terminated by `\n` or `\r`:
//!
//! | Pattern        | Effect                              |
//! |----------------|-------------------------------------|
//! | `LED:<n>:<0\|1>` | set LED n (1-based) unlit/lit     |
//! | `<ALIAS>:<0\|1>` | named form, fixed alias table     |
//! | `OFF`          | clear all LEDs                      |
//!
//! There is no feedback channel by design: malformed lines, unknown
//! aliases and out-of-range indices are silently dropped. Repeating a
//! command is a no-op, so the host may re-send freely.

use crate::charlie::Multiplexer;
use heapless::{String, Vec};

/// Alias → 0-based LED index, in wire order
const ALIASES: [&str; 13] = [
    "SIFA", "LZB", "PZB70", "PZB85", "PZB55", "500HZ", "1000HZ", "TUEREN_L", "TUEREN_R", "LZB_UE",
    "LZB_G", "LZB_S", "BEF40",
];

/// Longest valid line is `TUEREN_L:0`; anything beyond this is garbage
const LINE_CAPACITY: usize = 24;

/// A decoded command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set one LED (0-based index) lit/unlit
    Set(usize, bool),
    /// Clear every LED
    AllOff,
}

impl Command {
    /// Apply to the multiplexer's desired-state table
    pub fn apply(self, mux: &mut Multiplexer) {
        match self {
            Command::Set(index, lit) => mux.set(index, lit),
            Command::AllOff => mux.clear_all(),
        }
    }
}

/// Accumulates serial bytes into lines and decodes them
#[derive(Debug, Default)]
pub struct CommandParser {
    buffer: Vec<u8, LINE_CAPACITY>,
}

impl CommandParser {
    pub fn new() -> CommandParser {
        CommandParser::default()
    }

    /// Feed one received byte; returns a command when a full valid line
    /// terminated. Overlong lines are discarded wholesale.
    pub fn feed(&mut self, byte: u8) -> Option<Command> {
        if byte == b'\n' || byte == b'\r' {
            let command = core::str::from_utf8(&self.buffer)
                .ok()
                .and_then(parse_line);
            self.buffer.clear();
            return command;
        }
        if self.buffer.push(byte).is_err() {
            // Line too long: drop it and everything up to the terminator
            self.buffer.clear();
            // Mark poisoned by filling to capacity so the rest of the
            // line keeps overflowing until the terminator resets us
            let _ = self.buffer.resize(LINE_CAPACITY, 0);
        }
        None
    }
}

/// Decode one complete line
fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "OFF" {
        return Some(Command::AllOff);
    }
    if let Some(rest) = line.strip_prefix("LED:") {
        let (number, state) = rest.split_once(':')?;
        let number: usize = number.parse().ok()?;
        if number < 1 || number > ALIASES.len() {
            return None;
        }
        return Some(Command::Set(number - 1, parse_state(state)?));
    }
    let (alias, state) = line.split_once(':')?;
    let index = ALIASES.iter().position(|a| *a == alias)?;
    Some(Command::Set(index, parse_state(state)?))
}

fn parse_state(state: &str) -> Option<bool> {
    match state {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

/// Informational boot message, emitted once after reset
pub fn ready_line(variant: &str) -> String<32> {
    let mut line = String::new();
    let _ = line.push_str("OK:");
    let _ = line.push_str(variant);
    let _ = line.push_str(" Ready");
    line
}
