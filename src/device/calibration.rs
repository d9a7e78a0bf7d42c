// src/device/calibration.rs
//! Two-phase key calibration, stepped one tick at a time
//!
//! Release phase: after a settle delay, average a batch of readings per
//! channel to get the released baseline. Press phase: for each channel in
//! turn, prompt the operator, wait, then track the lowest reading over a
//! hold window.

use crate::config::DeviceSettings;
use crate::hal::AnalogSource;
use crate::processing::SignalChannel;
use crate::protocol::status;
use std::time::Duration;
use tracing::{debug, warn};

/// Phase durations and batch size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTiming {
    pub release_settle: Duration,
    pub release_samples: usize,
    pub press_prompt: Duration,
    pub press_window: Duration,
}

impl From<&DeviceSettings> for CalibrationTiming {
    fn from(settings: &DeviceSettings) -> Self {
        Self {
            release_settle: Duration::from_millis(settings.release_settle_ms),
            release_samples: settings.release_sample_count,
            press_prompt: Duration::from_millis(settings.press_prompt_ms),
            press_window: Duration::from_millis(settings.press_window_ms),
        }
    }
}

impl Default for CalibrationTiming {
    fn default() -> Self {
        Self::from(&DeviceSettings::default())
    }
}

/// Where the procedure currently is
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStep {
    /// Keys released, waiting before the baseline batch is taken
    SettleRelease { until_us: u64 },
    /// Operator has been asked to press `channel`; not sampling yet
    PromptPress { channel: usize, until_us: u64 },
    /// Sampling `channel` while it is held down
    HoldPress {
        channel: usize,
        until_us: u64,
        window: Vec<u16>,
    },
    Complete,
}

/// A running calibration
#[derive(Debug, Clone)]
pub struct CalibrationProcedure {
    timing: CalibrationTiming,
    step: CalibrationStep,
}

fn micros(duration: Duration) -> u64 {
    duration.as_micros() as u64
}

impl CalibrationProcedure {
    /// Start calibrating at `now_us`. Returns the procedure and the status
    /// lines announcing it.
    pub fn begin(timing: CalibrationTiming, now_us: u64) -> (Self, Vec<String>) {
        let procedure = Self {
            timing,
            step: CalibrationStep::SettleRelease {
                until_us: now_us.saturating_add(micros(timing.release_settle)),
            },
        };
        let lines = vec![
            status::CALIBRATION_STARTED.to_string(),
            status::RELEASE_PROMPT.to_string(),
        ];
        (procedure, lines)
    }

    pub fn step(&self) -> &CalibrationStep {
        &self.step
    }

    pub fn is_complete(&self) -> bool {
        self.step == CalibrationStep::Complete
    }

    /// Advance by one sub-step. Returns any status lines to emit.
    pub fn advance<S: AnalogSource + ?Sized>(
        &mut self,
        now_us: u64,
        source: &mut S,
        channels: &mut [SignalChannel],
    ) -> Vec<String> {
        let mut lines = Vec::new();

        match &mut self.step {
            CalibrationStep::SettleRelease { until_us } => {
                if now_us < *until_us {
                    return lines;
                }
                self.sample_release(source, channels);
                self.step = self.prompt(0, now_us, channels, &mut lines);
            }
            CalibrationStep::PromptPress { channel, until_us } => {
                if now_us >= *until_us {
                    let channel = *channel;
                    self.step = CalibrationStep::HoldPress {
                        channel,
                        until_us: now_us.saturating_add(micros(self.timing.press_window)),
                        window: Vec::new(),
                    };
                }
            }
            CalibrationStep::HoldPress {
                channel,
                until_us,
                window,
            } => {
                let channel = *channel;
                if now_us < *until_us {
                    window.push(source.read_raw(channel));
                    return lines;
                }

                let window = std::mem::take(window);
                if let Some(target) = channels.get_mut(channel) {
                    match target.calibrate_press(window) {
                        Some(lowest) => debug!(channel = target.name(), lowest, "press extreme saved"),
                        None => warn!(channel = target.name(), "no samples in press window"),
                    }
                    lines.push(status::channel_saved(target.name()));
                }
                self.step = self.prompt(channel + 1, now_us, channels, &mut lines);
            }
            CalibrationStep::Complete => {}
        }

        lines
    }

    fn sample_release<S: AnalogSource + ?Sized>(&self, source: &mut S, channels: &mut [SignalChannel]) {
        for (index, channel) in channels.iter_mut().enumerate() {
            let batch: Vec<u16> = (0..self.timing.release_samples)
                .map(|_| source.read_raw(index))
                .collect();
            match channel.calibrate_release(&batch) {
                Some(baseline) => debug!(channel = channel.name(), baseline, "release baseline saved"),
                None => warn!(channel = channel.name(), "empty release batch"),
            }
        }
    }

    /// Prompt for `channel`, or finish when every channel is done
    fn prompt(
        &self,
        channel: usize,
        now_us: u64,
        channels: &[SignalChannel],
        lines: &mut Vec<String>,
    ) -> CalibrationStep {
        match channels.get(channel) {
            Some(next) => {
                lines.push(status::press_prompt(next.name(), self.timing.press_window.as_millis() as u64));
                CalibrationStep::PromptPress {
                    channel,
                    until_us: now_us.saturating_add(micros(self.timing.press_prompt)),
                }
            }
            None => {
                lines.push(status::CALIBRATION_COMPLETE.to_string());
                CalibrationStep::Complete
            }
        }
    }
}
