// src/acquisition/console.rs
//! Operator-facing console sink

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn, Level};

/// Category of a console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Command sent to the device
    Tx,
    /// Status text received from the device
    Rx,
    /// Calibration instruction for the operator
    Instruction,
    /// Telemetry
    Data,
    /// Host-side event: connection changes, saved files, errors
    Notice,
}

impl LogCategory {
    /// Level used when the entry is emitted as a `tracing` event.
    /// Failures behind a notice are also logged at their own site with `warn!`/`error!`.
    pub fn level(self) -> Level {
        match self {
            LogCategory::Data => Level::TRACE,
            LogCategory::Rx => Level::DEBUG,
            LogCategory::Tx | LogCategory::Instruction | LogCategory::Notice => Level::INFO,
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LogCategory::Tx => "TX",
            LogCategory::Rx => "RX",
            LogCategory::Instruction => "INSTRUCTION",
            LogCategory::Data => "DATA",
            LogCategory::Notice => "NOTICE",
        };
        f.write_str(tag)
    }
}

pub trait ConsoleSink: Send + Sync {
    fn log(&self, text: &str, category: LogCategory);
}

/// Console backed by `tracing` events under the `hallkey::console` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn log(&self, text: &str, category: LogCategory) {
        match category.level() {
            Level::TRACE => trace!(target: "hallkey::console", %category, "{}", text),
            Level::DEBUG => debug!(target: "hallkey::console", %category, "{}", text),
            Level::INFO => info!(target: "hallkey::console", %category, "{}", text),
            _ => warn!(target: "hallkey::console", %category, "{}", text),
        }
    }
}

/// In-memory console; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    entries: Arc<Mutex<Vec<(LogCategory, String)>>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogCategory, String)> {
        self.entries.lock().clone()
    }

    /// Texts logged under `category`, oldest first
    pub fn texts(&self, category: LogCategory) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn contains(&self, category: LogCategory, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(c, text)| *c == category && text.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl ConsoleSink for MemoryConsole {
    fn log(&self, text: &str, category: LogCategory) {
        self.entries.lock().push((category, text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_console_shares_buffer() {
        let console = MemoryConsole::new();
        let sink: Arc<dyn ConsoleSink> = Arc::new(console.clone());

        sink.log("CAL", LogCategory::Tx);
        sink.log("Ready", LogCategory::Rx);
        sink.log("Press K1 fully and HOLD (3s)", LogCategory::Instruction);

        assert_eq!(console.entries().len(), 3);
        assert_eq!(console.texts(LogCategory::Tx), vec!["CAL"]);
        assert!(console.contains(LogCategory::Instruction, "K1"));
        assert!(!console.contains(LogCategory::Notice, "K1"));

        console.clear();
        assert!(console.entries().is_empty());
    }

    #[test]
    fn test_category_tags() {
        assert_eq!(LogCategory::Instruction.to_string(), "INSTRUCTION");
        assert_eq!(LogCategory::Tx.to_string(), "TX");
    }

    #[test]
    fn test_routine_notices_are_not_warnings() {
        assert_eq!(LogCategory::Notice.level(), Level::INFO);
        assert_eq!(LogCategory::Instruction.level(), Level::INFO);
        assert_eq!(LogCategory::Rx.level(), Level::DEBUG);
        assert_eq!(LogCategory::Data.level(), Level::TRACE);
    }
}
