// src/hal/mod.rs
//! Hardware abstraction layer: analog inputs on the device side, line links
//! on the host side

pub mod traits;
pub mod types;
pub mod loopback;
pub mod serial_driver;
pub mod simulator;

pub use loopback::{loopback_pair, DeviceEndpoint, LoopbackTransport};
pub use serial_driver::{list_ports, SerialConfig, SerialTransport};
pub use simulator::{KeyPattern, SensorHandle, SimulatedHallSensors, SimulatorConfig};
pub use traits::*;
pub use types::*;
