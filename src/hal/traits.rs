// src/hal/traits.rs
//! Core HAL traits: the device's analog inputs and the host's line link

use crate::hal::types::HalError;

/// Multi-channel analog input sampled by the device loop
pub trait AnalogSource: Send {
    /// Read one raw 16-bit sample from `channel`
    fn read_raw(&mut self, channel: usize) -> u16;

    /// Number of channels this source provides
    fn channel_count(&self) -> usize;
}

/// Receiving half of a line-oriented link
pub trait LinkReader: Send {
    /// Block for at most the link's read timeout.
    ///
    /// `Ok(Some(line))` is one line without its terminator, `Ok(None)` means
    /// the timeout elapsed, and `Err` means the link is unusable.
    fn read_line(&mut self) -> Result<Option<String>, HalError>;
}

/// Sending half of a line-oriented link
pub trait LinkWriter: Send {
    /// Write `line` followed by a newline
    fn write_line(&mut self, line: &str) -> Result<(), HalError>;
}

/// An open link, split so the reader half can move to its own thread.
/// Dropping both halves closes it.
pub struct Link {
    pub reader: Box<dyn LinkReader>,
    pub writer: Box<dyn LinkWriter>,
    pub description: String,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").field("description", &self.description).finish()
    }
}

/// Something that can open a link to a device
pub trait Transport {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Link, HalError>;
}
