//! hallkey-core: Hall-effect key sensor acquisition
//!
//! Both halves of a keyboard-travel measurement rig:
//!
//! - Device side: per-key smoothing and calibration, and the control state
//!   machine that streams normalized key depth over a serial link
//! - Host side: a reader thread and periodic dispatcher that ingest the
//!   stream, track connection state and record sessions to CSV
//! - The line protocol shared by the two
//! - Layered TOML configuration
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hallkey_core::acquisition::{AcquisitionHost, HostOptions, TracingConsole};
//! use hallkey_core::config::SystemConfig;
//! use hallkey_core::device::SimulatedTransport;
//! use hallkey_core::hal::KeyPattern;
//! use hallkey_core::storage::FsSessionDirectory;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SystemConfig::default();
//!     let transport = SimulatedTransport::new(
//!         config.device.clone(),
//!         KeyPattern::Sinusoidal { period_ms: 800 },
//!         config.serial.read_timeout(),
//!     );
//!
//!     let mut host = AcquisitionHost::new(HostOptions::from(&config), Arc::new(TracingConsole));
//!     host.connect(&transport, "sim0", config.serial.baud_rate)?;
//!
//!     let directory = FsSessionDirectory::new(&config.storage.data_dir);
//!     host.start_recording(&directory)?;
//!     host.run_until(Duration::from_secs(1), |_| false);
//!     host.stop_recording()?;
//!     host.disconnect()?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod device;
pub mod error;
pub mod hal;
pub mod processing;
pub mod protocol;
pub mod storage;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{AcquisitionHost, ConnectionState, HostConnectionState, PermittedActions, SessionPhase};
pub use config::{ConfigLoader, SystemConfig};
pub use device::{DeviceStateMachine, SimulatedTransport};
pub use error::{AcqError, AcqResult};
pub use hal::{HalError, Link, Transport};
pub use processing::SignalChannel;
pub use protocol::{classify, Command, Message, StatusKind, Telemetry};
pub use storage::{FsSessionDirectory, RecordingSession, SessionDirectory, FEATURE_COLUMNS};
pub use utils::time::TimeProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    let mut features = vec![
        "Per-key smoothing and two-phase calibration".to_string(),
        "Device control state machine".to_string(),
        "Threaded host ingestion pipeline".to_string(),
        "CSV session recording".to_string(),
    ];
    if cfg!(feature = "serial") {
        features.push("Serial port transport".to_string());
    }

    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Hall-effect key sensor acquisition and recording".to_string(),
        features,
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "hallkey-core");
    }
}
