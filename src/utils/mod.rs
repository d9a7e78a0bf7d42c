// src/utils/mod.rs
//! Common utilities shared by the device and host sides

pub mod time;

pub use time::{MockTimeProvider, MonotonicTimeProvider, TimeProvider};
