// src/config/constants.rs
//! System-wide configuration constants

/// Signal conditioning constants
pub mod signal {
    pub const DEFAULT_CHANNEL_COUNT: usize = 3;
    pub const MIN_CHANNEL_COUNT: usize = 1;
    pub const MAX_CHANNEL_COUNT: usize = 16;

    /// Full scale of the 16-bit ADC reading
    pub const ADC_FULL_SCALE: u16 = u16::MAX;

    pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.15;

    /// Calibration spans narrower than this report zero depth
    pub const DEGENERATE_SPAN_THRESHOLD: f64 = 500.0;

    pub const DEPTH_MIN: f64 = 0.0;
    pub const DEPTH_MAX: f64 = 1.0;

    /// Decimal digits used for depth values on the wire
    pub const DEPTH_DECIMALS: usize = 4;
}

/// Device loop and calibration timing
pub mod device {
    /// Interval between telemetry ticks (~200 Hz)
    pub const MEASURE_INTERVAL_MS: u64 = 5;
    pub const IDLE_INTERVAL_MS: u64 = 20;
    /// Poll interval while a calibration sub-step is waiting or sampling
    pub const CALIBRATION_POLL_MS: u64 = 1;

    pub const RELEASE_SAMPLE_COUNT: usize = 100;
    pub const RELEASE_SETTLE_MS: u64 = 2000;
    pub const PRESS_PROMPT_MS: u64 = 1000;
    pub const PRESS_WINDOW_MS: u64 = 3000;
}

/// Serial link constants
pub mod serial {
    pub const DEFAULT_PORT_NAME: &str = "/dev/ttyACM0";
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
    pub const MAX_BAUD_RATE: u32 = 4_000_000;
    pub const MAX_READ_TIMEOUT_MS: u64 = 5_000;
}

/// Host pipeline constants
pub mod host {
    pub const DEFAULT_DISPATCH_PERIOD_MS: u64 = 20;
    pub const MIN_DISPATCH_PERIOD_MS: u64 = 1;
    pub const MAX_DISPATCH_PERIOD_MS: u64 = 1_000;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;
    pub const MIN_QUEUE_CAPACITY: usize = 16;
    /// How long a blocked reader waits before re-checking for shutdown
    pub const BLOCKED_PUSH_RETRY_MS: u64 = 50;
}

/// Recording storage constants
pub mod storage {
    pub const DEFAULT_DATA_DIR: &str = "data";
    pub const USER_DIR_PREFIX: &str = "user_";
    pub const ATTEMPT_FILE_PREFIX: &str = "attempt_";
    pub const RECORDING_EXTENSION: &str = "csv";
    pub const METADATA_SUFFIX: &str = ".meta.json";
    pub const TIME_COLUMN: &str = "Time_us";
}

/// Environment and file locations
pub mod paths {
    pub const ENV_PREFIX: &str = "HALLKEY_";
    pub const ENV_SECTION_SEPARATOR: &str = "__";
    pub const DEFAULT_CONFIG_FILE: &str = "hallkey.toml";
    pub const USER_CONFIG_DIR: &str = ".config/hallkey";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_rate_is_about_200hz() {
        assert_eq!(1000 / device::MEASURE_INTERVAL_MS, 200);
        assert!(device::IDLE_INTERVAL_MS > device::MEASURE_INTERVAL_MS);
    }

    #[test]
    fn test_channel_bounds() {
        assert!(signal::MIN_CHANNEL_COUNT <= signal::DEFAULT_CHANNEL_COUNT);
        assert!(signal::DEFAULT_CHANNEL_COUNT <= signal::MAX_CHANNEL_COUNT);
        assert!(signal::DEFAULT_SMOOTHING_FACTOR > 0.0 && signal::DEFAULT_SMOOTHING_FACTOR <= 1.0);
    }
}
