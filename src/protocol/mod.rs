// src/protocol/mod.rs
//! Line-oriented command/telemetry protocol

pub mod codec;

pub use codec::{channel_label, classify, format_telemetry, status, Command, Message, StatusKind, Telemetry};
