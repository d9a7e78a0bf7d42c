// src/hal/serial_driver.rs
//! Serial link driver
//!
//! Newline-terminated ASCII over a point-to-point serial port. The read
//! timeout only keeps the reader responsive to a closing link; it is not a
//! protocol timeout.

use crate::config::constants::serial::{MAX_BAUD_RATE, MAX_READ_TIMEOUT_MS};
use crate::config::SerialSettings;
use crate::hal::{HalError, Link, LinkReader, LinkWriter, PortDescriptor, Transport};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;
#[cfg(feature = "serial")]
use tracing::{debug, info};

/// Serial device configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl From<&SerialSettings> for SerialConfig {
    fn from(settings: &SerialSettings) -> Self {
        Self {
            port_name: settings.port_name.clone(),
            baud_rate: settings.baud_rate,
            read_timeout: settings.read_timeout(),
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), HalError> {
        if self.port_name.is_empty() {
            return Err(HalError::Configuration("Port name cannot be empty".to_string()));
        }

        if self.baud_rate == 0 || self.baud_rate > MAX_BAUD_RATE {
            return Err(HalError::Configuration(format!("Invalid baud rate: {}", self.baud_rate)));
        }

        let timeout_ms = self.read_timeout.as_millis();
        if timeout_ms == 0 || timeout_ms > u128::from(MAX_READ_TIMEOUT_MS) {
            return Err(HalError::Configuration(format!("Invalid timeout: {} ms", timeout_ms)));
        }

        Ok(())
    }
}

/// Line reader over any byte stream whose reads may time out
///
/// A partial line survives a timeout and is completed by later reads. Bytes
/// are decoded lossily; invalid UTF-8 never fails a read.
pub struct StreamLineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> StreamLineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches(&['\r', '\n'][..])
            .to_string();
        self.pending.clear();
        line
    }
}

impl<R: Read + Send> LinkReader for StreamLineReader<R> {
    fn read_line(&mut self) -> Result<Option<String>, HalError> {
        match self.inner.read_until(b'\n', &mut self.pending) {
            Ok(0) => Err(HalError::Closed),
            Ok(_) if self.pending.ends_with(b"\n") => Ok(Some(self.take_line())),
            // End of stream after a final unterminated line
            Ok(_) => Ok(Some(self.take_line())),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(HalError::Read(e.to_string())),
        }
    }
}

/// Line writer over any byte sink
pub struct StreamLineWriter<W> {
    inner: W,
}

impl<W: Write> StreamLineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> LinkWriter for StreamLineWriter<W> {
    fn write_line(&mut self, line: &str) -> Result<(), HalError> {
        self.inner
            .write_all(line.as_bytes())
            .and_then(|_| self.inner.write_all(b"\n"))
            .and_then(|_| self.inner.flush())
            .map_err(|e| HalError::Write(e.to_string()))
    }
}

/// Opens real serial ports through the `serialport` crate
#[derive(Debug, Clone)]
pub struct SerialTransport {
    read_timeout: Duration,
}

impl SerialTransport {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Transport for SerialTransport {
    fn open(&self, port: &str, baud_rate: u32) -> Result<Link, HalError> {
        let config = SerialConfig {
            port_name: port.to_string(),
            baud_rate,
            read_timeout: self.read_timeout,
        };
        config.validate()?;
        open_serial(&config)
    }
}

#[cfg(feature = "serial")]
fn open_serial(config: &SerialConfig) -> Result<Link, HalError> {
    let map_open = |e: serialport::Error| match e.kind() {
        serialport::ErrorKind::NoDevice => HalError::PortNotFound(config.port_name.clone()),
        _ => HalError::OpenFailed {
            port: config.port_name.clone(),
            reason: e.to_string(),
        },
    };

    let mut port = serialport::new(&config.port_name, config.baud_rate)
        .timeout(config.read_timeout)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(map_open)?;

    // CDC-ACM firmware often waits for DTR before it starts printing
    if let Err(e) = port.write_data_terminal_ready(true) {
        debug!(port = %config.port_name, error = %e, "could not assert DTR");
    }

    let reader_port = port.try_clone().map_err(map_open)?;
    info!(port = %config.port_name, baud = config.baud_rate, "serial port opened");

    Ok(Link {
        reader: Box::new(StreamLineReader::new(reader_port)),
        writer: Box::new(StreamLineWriter::new(port)),
        description: format!("{} @ {} baud", config.port_name, config.baud_rate),
    })
}

#[cfg(not(feature = "serial"))]
fn open_serial(_config: &SerialConfig) -> Result<Link, HalError> {
    Err(HalError::FeatureNotEnabled("serial"))
}

/// Enumerate serial ports available on this machine
#[cfg(feature = "serial")]
pub fn list_ports() -> Result<Vec<PortDescriptor>, HalError> {
    let ports = serialport::available_ports().map_err(|e| HalError::Read(e.to_string()))?;
    let mut out: Vec<PortDescriptor> = ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => info
                    .product
                    .unwrap_or_else(|| format!("USB {:04x}:{:04x}", info.vid, info.pid)),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::Unknown => String::new(),
            };
            PortDescriptor { name: p.port_name, description }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

#[cfg(not(feature = "serial"))]
pub fn list_ports() -> Result<Vec<PortDescriptor>, HalError> {
    Err(HalError::FeatureNotEnabled("serial"))
}
