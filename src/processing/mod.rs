// src/processing/mod.rs
//! Signal conditioning: smoothing filters and calibrated channels

pub mod channel;
pub mod filters;

pub use channel::SignalChannel;
pub use filters::{ExponentialSmoother, Filter};
