//! Wire format of the filling machine's line protocol.
//!
//! Every command is one ASCII line terminated by `\n`. The firmware parses
//! decimal numbers leniently; this crate always sends floats with at least
//! one fractional digit (`5.0`, `0.1`, `12.5`) and counts as plain integers.

use crate::constants::{LINE_TERMINATOR, MAX_LINE_LEN};
use crate::types::FillParameters;
use std::fmt;
use std::string::FromUtf8Error;

/// Commands understood by the firmware
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetFillTime(f64),
    SetCount(u32),
    SetDistance(f64),
    SetRepeatDelay(f64),
    Start,
    Stop,
    ToggleRepeat,
}

impl Command {
    /// Configuration commands followed by `START`, in wire order
    pub fn start_sequence(params: &FillParameters) -> [Command; 5] {
        [
            Command::SetFillTime(params.fill_time_secs),
            Command::SetCount(params.bottle_count),
            Command::SetDistance(params.bottle_distance_cm),
            Command::SetRepeatDelay(params.repeat_delay_secs),
            Command::Start,
        ]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetFillTime(v) => write!(f, "SET FILLTIME {}", format_decimal(*v)),
            Command::SetCount(n) => write!(f, "SET COUNT {}", n),
            Command::SetDistance(v) => write!(f, "SET DISTANCE {}", format_decimal(*v)),
            Command::SetRepeatDelay(v) => write!(f, "SET REPEATDELAY {}", format_decimal(*v)),
            Command::Start => f.write_str("START"),
            Command::Stop => f.write_str("STOP"),
            Command::ToggleRepeat => f.write_str("TOGGLE REPEAT"),
        }
    }
}

/// Shortest round-tripping decimal, keeping a `.0` on whole numbers
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Encode a line for the wire
pub fn encode_line(line: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(LINE_TERMINATOR);
    bytes
}

/// Accumulates inbound bytes and splits them into lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Inside an over-long line; bytes are dropped up to its terminator
    discarding: bool,
}

impl LineBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the port.
    ///
    /// A line that grows past `MAX_LINE_LEN` is discarded whole, including
    /// bytes of it that arrive later. Returns the number of bytes dropped.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let mut bytes = bytes;
        let mut dropped = 0;
        if self.discarding {
            match bytes.iter().position(|&b| b == LINE_TERMINATOR) {
                Some(end) => {
                    dropped += end + 1;
                    bytes = &bytes[end + 1..];
                    self.discarding = false;
                }
                None => return bytes.len(),
            }
        }

        self.pending.extend_from_slice(bytes);
        let tail_start = self
            .pending
            .iter()
            .rposition(|&b| b == LINE_TERMINATOR)
            .map_or(0, |i| i + 1);
        let tail_len = self.pending.len() - tail_start;
        if tail_len > MAX_LINE_LEN {
            self.pending.truncate(tail_start);
            self.discarding = true;
            dropped += tail_len;
        }
        dropped
    }

    /// Pop the next complete line, decoded and trimmed
    pub fn next_line(&mut self) -> Option<Result<String, FromUtf8Error>> {
        let end = self.pending.iter().position(|&b| b == LINE_TERMINATOR)?;
        let mut raw: Vec<u8> = self.pending.drain(..=end).collect();
        raw.pop();
        Some(String::from_utf8(raw).map(|s| s.trim().to_string()))
    }

    /// Whether a complete line is buffered
    pub fn has_line(&self) -> bool {
        self.pending.contains(&LINE_TERMINATOR)
    }

    /// Buffered bytes not yet returned as a line
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// No buffered bytes
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
