// src/config/mod.rs
//! Configuration management: typed settings, defaults and layered loading

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Device-side signal conditioning and calibration settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeviceSettings {
    #[serde(default = "defaults::channel_count")]
    pub channel_count: usize,

    #[serde(default = "defaults::smoothing_factor")]
    pub smoothing_factor: f64,

    #[serde(default = "defaults::degenerate_span_threshold")]
    pub degenerate_span_threshold: f64,

    #[serde(default = "defaults::release_sample_count")]
    pub release_sample_count: usize,

    #[serde(default = "defaults::release_settle_ms")]
    pub release_settle_ms: u64,

    #[serde(default = "defaults::press_prompt_ms")]
    pub press_prompt_ms: u64,

    #[serde(default = "defaults::press_window_ms")]
    pub press_window_ms: u64,

    #[serde(default = "defaults::measure_interval_ms")]
    pub measure_interval_ms: u64,

    #[serde(default = "defaults::idle_interval_ms")]
    pub idle_interval_ms: u64,
}

/// Serial link settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SerialSettings {
    #[serde(default = "defaults::port_name")]
    pub port_name: String,

    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// What the reader does when the line queue is full
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reader waits for the dispatcher; nothing is lost in the pipeline
    #[default]
    Block,
    /// Oldest queued line is discarded and counted
    DropOldest,
}

/// Host ingestion pipeline settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HostSettings {
    #[serde(default = "defaults::dispatch_period_ms")]
    pub dispatch_period_ms: u64,

    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

/// Recording storage settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageSettings {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn channel_count() -> usize { signal::DEFAULT_CHANNEL_COUNT }
    pub fn smoothing_factor() -> f64 { signal::DEFAULT_SMOOTHING_FACTOR }
    pub fn degenerate_span_threshold() -> f64 { signal::DEGENERATE_SPAN_THRESHOLD }
    pub fn release_sample_count() -> usize { device::RELEASE_SAMPLE_COUNT }
    pub fn release_settle_ms() -> u64 { device::RELEASE_SETTLE_MS }
    pub fn press_prompt_ms() -> u64 { device::PRESS_PROMPT_MS }
    pub fn press_window_ms() -> u64 { device::PRESS_WINDOW_MS }
    pub fn measure_interval_ms() -> u64 { device::MEASURE_INTERVAL_MS }
    pub fn idle_interval_ms() -> u64 { device::IDLE_INTERVAL_MS }

    pub fn port_name() -> String { serial::DEFAULT_PORT_NAME.to_string() }
    pub fn baud_rate() -> u32 { serial::DEFAULT_BAUD_RATE }
    pub fn read_timeout_ms() -> u64 { serial::DEFAULT_READ_TIMEOUT_MS }

    pub fn dispatch_period_ms() -> u64 { host::DEFAULT_DISPATCH_PERIOD_MS }
    pub fn queue_capacity() -> usize { host::DEFAULT_QUEUE_CAPACITY }

    pub fn data_dir() -> String { storage::DEFAULT_DATA_DIR.to_string() }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            channel_count: defaults::channel_count(),
            smoothing_factor: defaults::smoothing_factor(),
            degenerate_span_threshold: defaults::degenerate_span_threshold(),
            release_sample_count: defaults::release_sample_count(),
            release_settle_ms: defaults::release_settle_ms(),
            press_prompt_ms: defaults::press_prompt_ms(),
            press_window_ms: defaults::press_window_ms(),
            measure_interval_ms: defaults::measure_interval_ms(),
            idle_interval_ms: defaults::idle_interval_ms(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port_name: defaults::port_name(),
            baud_rate: defaults::baud_rate(),
            read_timeout_ms: defaults::read_timeout_ms(),
        }
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            dispatch_period_ms: defaults::dispatch_period_ms(),
            queue_capacity: defaults::queue_capacity(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { data_dir: defaults::data_dir() }
    }
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl HostSettings {
    pub fn dispatch_period(&self) -> Duration {
        Duration::from_millis(self.dispatch_period_ms)
    }
}

impl SystemConfig {
    /// Validate ranges and cross-field consistency
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let d = &self.device;

        if !(signal::MIN_CHANNEL_COUNT..=signal::MAX_CHANNEL_COUNT).contains(&d.channel_count) {
            errors.push(format!(
                "channel_count {} outside {}..={}",
                d.channel_count,
                signal::MIN_CHANNEL_COUNT,
                signal::MAX_CHANNEL_COUNT
            ));
        }

        if !(d.smoothing_factor > 0.0 && d.smoothing_factor <= 1.0) {
            errors.push(format!("smoothing_factor {} must be in (0, 1]", d.smoothing_factor));
        }

        if d.degenerate_span_threshold < 0.0 {
            errors.push("degenerate_span_threshold must not be negative".to_string());
        }

        if d.release_sample_count == 0 {
            errors.push("release_sample_count must be at least 1".to_string());
        }

        if d.press_window_ms == 0 {
            errors.push("press_window_ms must be non-zero".to_string());
        }

        if d.measure_interval_ms == 0 || d.measure_interval_ms > d.idle_interval_ms {
            errors.push(format!(
                "measure_interval_ms ({}) must be non-zero and not exceed idle_interval_ms ({})",
                d.measure_interval_ms, d.idle_interval_ms
            ));
        }

        let s = &self.serial;
        if s.port_name.is_empty() {
            errors.push("serial port name cannot be empty".to_string());
        }
        if s.baud_rate == 0 || s.baud_rate > serial::MAX_BAUD_RATE {
            errors.push(format!("invalid baud rate: {}", s.baud_rate));
        }
        if s.read_timeout_ms == 0 || s.read_timeout_ms > serial::MAX_READ_TIMEOUT_MS {
            errors.push(format!("invalid read timeout: {} ms", s.read_timeout_ms));
        }

        let h = &self.host;
        if !(host::MIN_DISPATCH_PERIOD_MS..=host::MAX_DISPATCH_PERIOD_MS).contains(&h.dispatch_period_ms) {
            errors.push(format!("invalid dispatch period: {} ms", h.dispatch_period_ms));
        }
        if h.queue_capacity < host::MIN_QUEUE_CAPACITY {
            errors.push(format!(
                "queue_capacity {} below minimum {}",
                h.queue_capacity,
                host::MIN_QUEUE_CAPACITY
            ));
        }

        if self.storage.data_dir.trim().is_empty() {
            errors.push("storage data_dir cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            channel_count: self.device.channel_count,
            sample_rate_hz: 1000 / self.device.measure_interval_ms.max(1),
            port_name: self.serial.port_name.clone(),
            baud_rate: self.serial.baud_rate,
            overflow_policy: self.host.overflow_policy,
            data_dir: self.storage.data_dir.clone(),
        }
    }
}

/// Configuration summary for display/logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub channel_count: usize,
    pub sample_rate_hz: u64,
    pub port_name: String,
    pub baud_rate: u32,
    pub overflow_policy: OverflowPolicy,
    pub data_dir: String,
}
