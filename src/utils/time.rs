// src/utils/time.rs
//! Time sources for the device loop and the host

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send {
    /// Monotonic microseconds since an arbitrary origin
    fn now_micros(&self) -> u64;

    fn now_millis(&self) -> u64 {
        self.now_micros() / 1000
    }
}

/// Monotonic clock starting at zero when created, like a controller's tick counter
#[derive(Debug, Clone)]
pub struct MonotonicTimeProvider {
    origin: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Mock time provider for deterministic testing
///
/// Clones share the same clock, so a test can keep one handle and advance
/// time while the state machine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTimeProvider {
    current_time: Arc<AtomicU64>,
}

impl MockTimeProvider {
    pub fn new(initial_time_micros: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(initial_time_micros)),
        }
    }

    pub fn advance_micros(&self, micros: u64) {
        self.current_time.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance_micros(millis * 1000);
    }

    pub fn set_time(&self, micros: u64) {
        self.current_time.store(micros, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_micros(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clones_share_time() {
        let clock = MockTimeProvider::new(1_000);
        let handle = clock.clone();

        handle.advance_millis(5);
        assert_eq!(clock.now_micros(), 6_000);
        assert_eq!(clock.now_millis(), 6);

        clock.set_time(42);
        assert_eq!(handle.now_micros(), 42);
    }

    #[test]
    fn test_monotonic_never_goes_backwards() {
        let clock = MonotonicTimeProvider::new();
        let a = clock.now_micros();
        let b = clock.now_micros();
        assert!(b >= a);
    }
}
