// src/processing/channel.rs
//! Per-sensor signal channel: smoothing plus calibration-to-depth mapping

use crate::config::constants::signal::{
    ADC_FULL_SCALE, DEFAULT_SMOOTHING_FACTOR, DEGENERATE_SPAN_THRESHOLD, DEPTH_MAX, DEPTH_MIN,
};
use crate::processing::filters::{ExponentialSmoother, Filter};

/// One Hall-effect key input with its filter and calibration state
///
/// A released key reads high and a pressed key reads low, so depth is the
/// distance travelled from `max_value` (released) towards `min_value`
/// (pressed), normalized to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct SignalChannel {
    name: String,
    min_value: f64,
    max_value: f64,
    smoother: ExponentialSmoother,
    span_threshold: f64,
}

impl SignalChannel {
    /// Uncalibrated channel: full-scale bounds, filter parked at the released level
    pub fn new(name: impl Into<String>, smoothing_factor: f64) -> Self {
        let full_scale = f64::from(ADC_FULL_SCALE);
        Self {
            name: name.into(),
            min_value: 0.0,
            max_value: full_scale,
            smoother: ExponentialSmoother::new(smoothing_factor, full_scale),
            span_threshold: DEGENERATE_SPAN_THRESHOLD,
        }
    }

    /// Channel with the default smoothing factor
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_SMOOTHING_FACTOR)
    }

    /// Override the degenerate-span threshold
    pub fn with_span_threshold(mut self, threshold: f64) -> Self {
        self.span_threshold = threshold.max(0.0);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn filtered_value(&self) -> f64 {
        self.smoother.output()
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.smoother.alpha()
    }

    /// Apply exponential smoothing to a new raw reading
    pub fn update(&mut self, raw_reading: u16) -> f64 {
        self.smoother.process(f64::from(raw_reading))
    }

    /// Normalized depth in [0, 1]; 0.0 when the calibration span is degenerate
    pub fn depth(&self) -> f64 {
        let amplitude = self.max_value - self.min_value;
        if amplitude.abs() < self.span_threshold {
            return 0.0;
        }
        let depth = (self.max_value - self.filtered_value()) / amplitude;
        if depth.is_nan() {
            return 0.0;
        }
        depth.clamp(DEPTH_MIN, DEPTH_MAX)
    }

    /// Set the released baseline to the mean of `samples` and park the filter there
    ///
    /// Returns the new baseline, or `None` (state untouched) for an empty batch.
    pub fn calibrate_release(&mut self, samples: &[u16]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().map(|&s| f64::from(s)).sum();
        let mean = sum / samples.len() as f64;
        self.max_value = mean;
        self.smoother.reset(mean);
        Some(mean)
    }

    /// Set the pressed extreme to the lowest reading in `window`
    ///
    /// Returns the new minimum, or `None` (state untouched) for an empty window.
    pub fn calibrate_press<I>(&mut self, window: I) -> Option<u16>
    where
        I: IntoIterator<Item = u16>,
    {
        let lowest = window.into_iter().min()?;
        self.min_value = f64::from(lowest);
        Some(lowest)
    }

    /// Force calibration bounds directly
    pub fn set_bounds(&mut self, min_value: f64, max_value: f64) {
        self.min_value = min_value;
        self.max_value = max_value;
    }

    /// Force the filter state directly
    pub fn set_filtered_value(&mut self, value: f64) {
        self.smoother.reset(value);
    }

    /// True when the current bounds produce a usable depth
    pub fn is_calibrated(&self) -> bool {
        (self.max_value - self.min_value).abs() >= self.span_threshold
    }
}
