// src/hal/simulator.rs
//! Simulated Hall-effect key sensors
//!
//! A released key reads high and a fully pressed key reads low, the way a
//! magnet approaching a linear Hall sensor pulls its output down. Key travel
//! is set through a [`SensorHandle`] that can live on another thread.

use crate::hal::AnalogSource;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub channel_count: usize,
    /// Raw reading of a fully released key
    pub released_level: u16,
    /// Raw reading of a fully pressed key
    pub pressed_level: u16,
    /// Peak-to-peak uniform noise in raw counts
    pub noise_amplitude: f32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channel_count: crate::config::constants::signal::DEFAULT_CHANNEL_COUNT,
            released_level: 50_000,
            pressed_level: 10_000,
            noise_amplitude: 40.0,
        }
    }
}

/// Key movement driven over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KeyPattern {
    /// Every key stays released
    Idle,
    /// Every key held at a fixed travel fraction
    Constant(f32),
    /// Keys press and release in turn, each phase shifted by one channel
    Sinusoidal { period_ms: u32 },
    /// Keys pressed one after another for `hold_ms` each
    Sequential { hold_ms: u32 },
}

impl KeyPattern {
    /// Travel fraction for `channel` at `t_ms`
    pub fn travel_at(&self, channel: usize, channel_count: usize, t_ms: u64) -> f32 {
        match *self {
            KeyPattern::Idle => 0.0,
            KeyPattern::Constant(travel) => travel.clamp(0.0, 1.0),
            KeyPattern::Sinusoidal { period_ms } => {
                let period = period_ms.max(1) as f64;
                let phase = channel as f64 / channel_count.max(1) as f64;
                let angle = 2.0 * std::f64::consts::PI * ((t_ms as f64 / period) + phase);
                (0.5 - 0.5 * angle.cos()) as f32
            }
            KeyPattern::Sequential { hold_ms } => {
                let slot = t_ms / u64::from(hold_ms.max(1));
                if slot as usize % channel_count.max(1) == channel {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Shared key travel, one fraction per channel in `[0, 1]`
#[derive(Debug, Clone)]
pub struct SensorHandle {
    travel: Arc<Mutex<Vec<f32>>>,
}

impl SensorHandle {
    /// Set `channel` to `travel` (0 released, 1 bottomed out). Out-of-range
    /// channels are ignored.
    pub fn press(&self, channel: usize, travel: f32) {
        if let Some(slot) = self.travel.lock().get_mut(channel) {
            *slot = travel.clamp(0.0, 1.0);
        }
    }

    pub fn release_all(&self) {
        self.travel.lock().iter_mut().for_each(|t| *t = 0.0);
    }

    /// Apply `pattern` to every channel for time `t_ms`
    pub fn apply(&self, pattern: &KeyPattern, t_ms: u64) {
        let mut travel = self.travel.lock();
        let count = travel.len();
        for (channel, slot) in travel.iter_mut().enumerate() {
            *slot = pattern.travel_at(channel, count, t_ms);
        }
    }

    pub fn travel(&self, channel: usize) -> Option<f32> {
        self.travel.lock().get(channel).copied()
    }
}

/// Analog source producing Hall sensor readings from simulated key travel
#[derive(Debug)]
pub struct SimulatedHallSensors {
    config: SimulatorConfig,
    travel: Arc<Mutex<Vec<f32>>>,
}

impl SimulatedHallSensors {
    pub fn new(config: SimulatorConfig) -> Self {
        let travel = Arc::new(Mutex::new(vec![0.0; config.channel_count]));
        Self { config, travel }
    }

    /// Handle for moving keys while the sensors are owned elsewhere
    pub fn handle(&self) -> SensorHandle {
        SensorHandle {
            travel: Arc::clone(&self.travel),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn noise(&self) -> f32 {
        if self.config.noise_amplitude <= 0.0 {
            0.0
        } else {
            (rand::random::<f32>() - 0.5) * self.config.noise_amplitude
        }
    }
}

impl AnalogSource for SimulatedHallSensors {
    fn read_raw(&mut self, channel: usize) -> u16 {
        let travel = self.travel.lock().get(channel).copied().unwrap_or(0.0);
        let released = f32::from(self.config.released_level);
        let pressed = f32::from(self.config.pressed_level);
        let level = released + (pressed - released) * travel + self.noise();
        level.round().clamp(0.0, f32::from(u16::MAX)) as u16
    }

    fn channel_count(&self) -> usize {
        self.config.channel_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimulatedHallSensors {
        SimulatedHallSensors::new(SimulatorConfig {
            noise_amplitude: 0.0,
            ..SimulatorConfig::default()
        })
    }

    #[test]
    fn test_released_and_pressed_levels() {
        let mut sensors = quiet();
        let handle = sensors.handle();

        assert_eq!(sensors.read_raw(0), 50_000);
        handle.press(0, 1.0);
        assert_eq!(sensors.read_raw(0), 10_000);
        handle.press(0, 0.5);
        assert_eq!(sensors.read_raw(0), 30_000);
        assert_eq!(sensors.read_raw(1), 50_000);

        handle.release_all();
        assert_eq!(sensors.read_raw(0), 50_000);
    }

    #[test]
    fn test_out_of_range_channel_reads_released() {
        let mut sensors = quiet();
        sensors.handle().press(99, 1.0);
        assert_eq!(sensors.read_raw(99), 50_000);
    }

    #[test]
    fn test_noise_stays_bounded() {
        let mut sensors = SimulatedHallSensors::new(SimulatorConfig::default());
        for _ in 0..1000 {
            let raw = sensors.read_raw(1);
            assert!((49_979..=50_021).contains(&raw), "{raw}");
        }
    }

    #[test]
    fn test_patterns() {
        assert_eq!(KeyPattern::Idle.travel_at(0, 3, 500), 0.0);
        assert_eq!(KeyPattern::Constant(2.0).travel_at(1, 3, 0), 1.0);

        let seq = KeyPattern::Sequential { hold_ms: 100 };
        assert_eq!(seq.travel_at(0, 3, 50), 1.0);
        assert_eq!(seq.travel_at(1, 3, 150), 1.0);
        assert_eq!(seq.travel_at(0, 3, 150), 0.0);

        let sine = KeyPattern::Sinusoidal { period_ms: 1000 };
        assert!(sine.travel_at(0, 3, 0).abs() < 1e-6);
        assert!((sine.travel_at(0, 3, 500) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_handle_applies_pattern() {
        let sensors = quiet();
        let handle = sensors.handle();
        handle.apply(&KeyPattern::Sequential { hold_ms: 10 }, 25);
        assert_eq!(handle.travel(2), Some(1.0));
        assert_eq!(handle.travel(0), Some(0.0));
    }
}
