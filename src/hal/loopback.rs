// src/hal/loopback.rs
//! In-process link built on crossbeam channels
//!
//! The host gets an ordinary [`Link`]; the other end is a [`DeviceEndpoint`]
//! that a simulated device (or a test) drives. Dropping the endpoint looks
//! to the host exactly like an unplugged serial cable.

use crate::hal::{HalError, Link, LinkReader, LinkWriter, Transport};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::time::Duration;

/// Device side of a loopback link
#[derive(Debug)]
pub struct DeviceEndpoint {
    commands: Receiver<String>,
    lines: Sender<String>,
}

impl DeviceEndpoint {
    /// Send one line towards the host
    pub fn send_line(&self, line: impl Into<String>) -> Result<(), HalError> {
        self.lines.send(line.into()).map_err(|_| HalError::Closed)
    }

    /// Next command line from the host, if one is waiting
    pub fn try_recv_command(&self) -> Result<Option<String>, HalError> {
        match self.commands.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HalError::Closed),
        }
    }

    /// Wait up to `timeout` for a command line
    pub fn recv_command_timeout(&self, timeout: Duration) -> Result<Option<String>, HalError> {
        match self.commands.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(HalError::Closed),
        }
    }

    /// All commands received so far, without waiting
    pub fn drain_commands(&self) -> Vec<String> {
        self.commands.try_iter().collect()
    }
}

struct ChannelReader {
    rx: Receiver<String>,
    timeout: Duration,
}

impl LinkReader for ChannelReader {
    fn read_line(&mut self) -> Result<Option<String>, HalError> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(HalError::Closed),
        }
    }
}

struct ChannelWriter {
    tx: Sender<String>,
}

impl LinkWriter for ChannelWriter {
    fn write_line(&mut self, line: &str) -> Result<(), HalError> {
        self.tx.send(line.to_string()).map_err(|_| HalError::Closed)
    }
}

/// Create a connected host link and device endpoint
pub fn loopback_pair(read_timeout: Duration) -> (Link, DeviceEndpoint) {
    let (cmd_tx, cmd_rx) = channel::unbounded();
    let (line_tx, line_rx) = channel::unbounded();

    let link = Link {
        reader: Box::new(ChannelReader { rx: line_rx, timeout: read_timeout }),
        writer: Box::new(ChannelWriter { tx: cmd_tx }),
        description: "loopback".to_string(),
    };
    let endpoint = DeviceEndpoint { commands: cmd_rx, lines: line_tx };
    (link, endpoint)
}

/// Transport that hands out one pre-built loopback link
///
/// A second `open` fails with `PortNotFound`, like a device that is already
/// claimed.
pub struct LoopbackTransport {
    link: Mutex<Option<Link>>,
}

impl LoopbackTransport {
    pub fn new(read_timeout: Duration) -> (Self, DeviceEndpoint) {
        let (link, endpoint) = loopback_pair(read_timeout);
        (Self { link: Mutex::new(Some(link)) }, endpoint)
    }
}

impl Transport for LoopbackTransport {
    fn open(&self, port: &str, _baud_rate: u32) -> Result<Link, HalError> {
        self.link
            .lock()
            .take()
            .ok_or_else(|| HalError::PortNotFound(port.to_string()))
    }
}
