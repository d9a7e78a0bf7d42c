// src/device/state_machine.rs
//! Device control loop as an explicit state machine
//!
//! One [`DeviceStateMachine::tick`] is one pass of the controller's polling
//! loop: act on at most one received command, do the work of the current
//! state, and report how long to sleep before the next pass.

use crate::config::DeviceSettings;
use crate::device::calibration::{CalibrationProcedure, CalibrationTiming};
use crate::hal::AnalogSource;
use crate::processing::SignalChannel;
use crate::protocol::{channel_label, format_telemetry, status, Command};
use crate::utils::TimeProvider;
use std::time::Duration;
use tracing::{debug, info};

/// Current device state, with the data each state needs
#[derive(Debug, Clone)]
pub enum DeviceState {
    Idle,
    Calibrating(CalibrationProcedure),
    /// Streaming telemetry; timestamps are relative to `origin_us`
    Measuring { origin_us: u64 },
}

/// State tag without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Idle,
    Calibrating,
    Measuring,
}

/// Result of one loop pass
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Lines to send to the host, in order
    pub lines: Vec<String>,
    /// How long the loop should sleep before the next pass
    pub sleep: Duration,
}

pub struct DeviceStateMachine<S, C> {
    source: S,
    clock: C,
    channels: Vec<SignalChannel>,
    state: DeviceState,
    timing: CalibrationTiming,
    measure_interval: Duration,
    idle_interval: Duration,
}

impl<S: AnalogSource, C: TimeProvider> DeviceStateMachine<S, C> {
    /// Build a machine with one channel per source input, named `K1..Kn`
    pub fn new(source: S, clock: C, settings: &DeviceSettings) -> Self {
        let channels = (0..source.channel_count())
            .map(|i| {
                SignalChannel::new(channel_label(i), settings.smoothing_factor)
                    .with_span_threshold(settings.degenerate_span_threshold)
            })
            .collect();

        Self {
            source,
            clock,
            channels,
            state: DeviceState::Idle,
            timing: CalibrationTiming::from(settings),
            measure_interval: Duration::from_millis(settings.measure_interval_ms),
            idle_interval: Duration::from_millis(settings.idle_interval_ms),
        }
    }

    /// Line printed once at boot
    pub fn banner(&self) -> &'static str {
        status::READY
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn mode(&self) -> DeviceMode {
        match self.state {
            DeviceState::Idle => DeviceMode::Idle,
            DeviceState::Calibrating(_) => DeviceMode::Calibrating,
            DeviceState::Measuring { .. } => DeviceMode::Measuring,
        }
    }

    pub fn channels(&self) -> &[SignalChannel] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [SignalChannel] {
        &mut self.channels
    }

    /// Run one pass with an optional received line
    pub fn tick(&mut self, input: Option<&str>) -> Tick {
        let mut lines = Vec::new();

        if let Some(line) = input {
            self.handle_line(line, &mut lines);
        }

        let now_us = self.clock.now_micros();
        let sleep = match &mut self.state {
            DeviceState::Idle => self.idle_interval,
            DeviceState::Measuring { origin_us } => {
                let elapsed = now_us.saturating_sub(*origin_us);
                lines.push(self.sample_telemetry(elapsed));
                self.measure_interval
            }
            DeviceState::Calibrating(procedure) => {
                lines.extend(procedure.advance(now_us, &mut self.source, &mut self.channels));
                if procedure.is_complete() {
                    info!("calibration complete");
                    self.state = DeviceState::Idle;
                }
                Duration::from_millis(crate::config::constants::device::CALIBRATION_POLL_MS)
            }
        };

        Tick { lines, sleep }
    }

    fn handle_line(&mut self, line: &str, lines: &mut Vec<String>) {
        let Some(command) = Command::parse(line) else {
            debug!(line, "ignoring unrecognised input");
            return;
        };

        if matches!(self.state, DeviceState::Calibrating(_)) {
            debug!(%command, "command ignored during calibration");
            return;
        }

        let now_us = self.clock.now_micros();
        match command {
            Command::Calibrate => {
                info!("calibration started");
                let (procedure, announce) = CalibrationProcedure::begin(self.timing, now_us);
                lines.extend(announce);
                self.state = DeviceState::Calibrating(procedure);
            }
            Command::Start => {
                info!("measurement started");
                self.state = DeviceState::Measuring { origin_us: now_us };
                lines.push(status::MEASUREMENT_STARTED.to_string());
            }
            Command::Stop => {
                info!("measurement stopped");
                self.state = DeviceState::Idle;
                lines.push(status::MEASUREMENT_STOPPED.to_string());
            }
        }
    }

    fn sample_telemetry(&mut self, elapsed_us: u64) -> String {
        let source = &mut self.source;
        let depths: Vec<f64> = self
            .channels
            .iter_mut()
            .enumerate()
            .map(|(index, channel)| {
                channel.update(source.read_raw(index));
                channel.depth()
            })
            .collect();
        format_telemetry(elapsed_us, &depths)
    }
}
