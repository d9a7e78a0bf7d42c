// src/protocol/codec.rs
//! Line vocabulary shared by the device and the host
//!
//! Every line on the link is newline-terminated ASCII. Commands travel host
//! to device; telemetry and free-text status travel device to host.
//! Classification is by shape and substring, not by framing, and lives in
//! [`classify`] alone so a stricter framing can replace it later.

use crate::config::constants::signal::DEPTH_DECIMALS;
use std::fmt;

/// Field delimiter of telemetry lines
pub const FIELD_DELIMITER: char = ',';

/// Status lines the device emits
pub mod status {
    pub const READY: &str = "Ready";
    pub const CALIBRATION_STARTED: &str = "--- CALIBRATION STARTED ---";
    pub const RELEASE_PROMPT: &str = "Release all keys and wait...";
    pub const CALIBRATION_COMPLETE: &str = "--- CALIBRATION COMPLETE ---";
    pub const MEASUREMENT_STARTED: &str = "Measurement started";
    pub const MEASUREMENT_STOPPED: &str = "Measurement stopped";

    pub fn press_prompt(channel: &str, window_ms: u64) -> String {
        format!("Press {} fully and HOLD ({}s)", channel, window_ms / 1000)
    }

    pub fn channel_saved(channel: &str) -> String {
        format!("   {} values saved!", channel)
    }
}

/// Operator-facing name of a zero-based channel index: `K1`, `K2`, ...
pub fn channel_label(index: usize) -> String {
    format!("K{}", index + 1)
}

/// Substrings that mark an operator calibration prompt
pub const CALIBRATION_PROMPT_MARKERS: [&str; 3] = ["STARTED", "Press ", "wait"];

/// Substring that marks the end of calibration
pub const CALIBRATION_COMPLETE_MARKER: &str = "COMPLETE";

/// Host to device command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Calibrate,
    Start,
    Stop,
}

impl Command {
    /// Parse a received command line: trimmed, case-insensitive
    pub fn parse(line: &str) -> Option<Self> {
        let token = line.trim();
        if token.eq_ignore_ascii_case("CAL") {
            Some(Command::Calibrate)
        } else if token.eq_ignore_ascii_case("START") {
            Some(Command::Start)
        } else if token.eq_ignore_ascii_case("STOP") {
            Some(Command::Stop)
        } else {
            None
        }
    }

    /// Wire token, without the line terminator
    pub fn as_wire(&self) -> &'static str {
        match self {
            Command::Calibrate => "CAL",
            Command::Start => "START",
            Command::Stop => "STOP",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One timestamped multi-channel sample, kept as the fields it arrived as
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub timestamp_us: u64,
    fields: Vec<String>,
}

impl Telemetry {
    /// All fields including the timestamp, exactly as received
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Depth fields only, unparsed
    pub fn depth_fields(&self) -> &[String] {
        &self.fields[1..]
    }

    pub fn channel_count(&self) -> usize {
        self.fields.len() - 1
    }

    /// Depth fields parsed as numbers; unparseable fields become `None`
    pub fn depths(&self) -> Vec<Option<f64>> {
        self.depth_fields()
            .iter()
            .map(|f| f.trim().parse::<f64>().ok())
            .collect()
    }
}

/// What a status line means to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Operator instruction during calibration; sets the calibrating flag
    CalibrationPrompt,
    /// Calibration finished; clears the calibrating flag
    CalibrationComplete,
    /// Display-only text
    Info,
}

/// A classified device-to-host line
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Telemetry(Telemetry),
    Status { kind: StatusKind, text: String },
    /// Blank line, nothing to do
    Empty,
}

/// Classify one received line. Pure and stateless.
pub fn classify(line: &str) -> Message {
    let line = line.trim();
    if line.is_empty() {
        return Message::Empty;
    }

    if let Some(telemetry) = parse_telemetry(line) {
        return Message::Telemetry(telemetry);
    }

    let kind = if CALIBRATION_PROMPT_MARKERS.iter().any(|m| line.contains(m)) {
        StatusKind::CalibrationPrompt
    } else if line.contains(CALIBRATION_COMPLETE_MARKER) {
        StatusKind::CalibrationComplete
    } else {
        StatusKind::Info
    };

    Message::Status {
        kind,
        text: line.to_string(),
    }
}

fn parse_telemetry(line: &str) -> Option<Telemetry> {
    if !line.contains(FIELD_DELIMITER) {
        return None;
    }
    let fields: Vec<String> = line.split(FIELD_DELIMITER).map(str::to_string).collect();
    let first = fields.first()?;
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let timestamp_us = first.parse::<u64>().ok()?;
    Some(Telemetry { timestamp_us, fields })
}

/// Format one telemetry line (no terminator)
pub fn format_telemetry(timestamp_us: u64, depths: &[f64]) -> String {
    let mut line = timestamp_us.to_string();
    for depth in depths {
        line.push(FIELD_DELIMITER);
        line.push_str(&format!("{:.*}", DEPTH_DECIMALS, depth));
    }
    line
}
