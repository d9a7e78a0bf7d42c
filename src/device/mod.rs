// src/device/mod.rs
//! Device-side firmware logic: calibration, the control state machine and
//! the loop that drives it

pub mod calibration;
pub mod runner;
pub mod state_machine;

pub use calibration::{CalibrationProcedure, CalibrationStep, CalibrationTiming};
pub use runner::{run_device, AutoOperator, DeviceIo, SimulatedTransport};
pub use state_machine::{DeviceMode, DeviceState, DeviceStateMachine, Tick};
