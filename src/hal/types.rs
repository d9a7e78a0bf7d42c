// src/hal/types.rs
//! Core types for link and sensor abstraction

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hardware/link level errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HalError {
    #[error("serial port not found: {0}")]
    PortNotFound(String),
    #[error("failed to open {port}: {reason}")]
    OpenFailed { port: String, reason: String },
    #[error("read error: {0}")]
    Read(String),
    #[error("write error: {0}")]
    Write(String),
    #[error("link closed")]
    Closed,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("feature '{0}' not enabled in this build")]
    FeatureNotEnabled(&'static str),
}

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub name: String,
    pub description: String,
}

impl PortDescriptor {
    /// `"<name> (<description>)"`, the form shown in a port picker
    pub fn display_name(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_display_name() {
        let port = PortDescriptor { name: "COM3".into(), description: "Pico".into() };
        assert_eq!(port.display_name(), "COM3 (Pico)");

        let bare = PortDescriptor { name: "/dev/ttyS0".into(), description: String::new() };
        assert_eq!(bare.display_name(), "/dev/ttyS0");
    }

    #[test]
    fn test_error_display_formatting() {
        let err = HalError::OpenFailed { port: "/dev/ttyACM0".into(), reason: "busy".into() };
        assert_eq!(err.to_string(), "failed to open /dev/ttyACM0: busy");
        assert_eq!(HalError::Closed.to_string(), "link closed");
    }
}
