// src/processing/filters.rs
//! Per-sample smoothing filters

/// A single-input filter advanced one sample at a time
pub trait Filter {
    /// Feed one sample and return the new output
    fn process(&mut self, input: f64) -> f64;
    /// Force the filter output to a known value
    fn reset(&mut self, value: f64);
    fn output(&self) -> f64;
}

/// Exponential moving average: `y' = (1 - α)·y + α·x`
///
/// With α in (0, 1] the output is always a convex combination of the
/// previous output and the new input.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialSmoother {
    alpha: f64,
    value: f64,
}

impl ExponentialSmoother {
    /// `alpha` outside (0, 1] is clamped into that range
    pub fn new(alpha: f64, initial: f64) -> Self {
        let alpha = if alpha.is_nan() { 1.0 } else { alpha.clamp(f64::MIN_POSITIVE, 1.0) };
        Self { alpha, value: initial }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Filter for ExponentialSmoother {
    fn process(&mut self, input: f64) -> f64 {
        self.value = (1.0 - self.alpha) * self.value + self.alpha * input;
        self.value
    }

    fn reset(&mut self, value: f64) {
        self.value = value;
    }

    fn output(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_one_tracks_input() {
        let mut f = ExponentialSmoother::new(1.0, 100.0);
        assert_eq!(f.process(42.0), 42.0);
    }

    #[test]
    fn test_step_response_converges() {
        let mut f = ExponentialSmoother::new(0.15, 65535.0);
        for _ in 0..200 {
            f.process(1000.0);
        }
        assert!((f.output() - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_alpha_is_clamped() {
        assert_eq!(ExponentialSmoother::new(2.0, 0.0).alpha(), 1.0);
        assert!(ExponentialSmoother::new(-1.0, 0.0).alpha() > 0.0);
    }

    #[test]
    fn test_reset() {
        let mut f = ExponentialSmoother::new(0.5, 0.0);
        f.process(10.0);
        f.reset(3.0);
        assert_eq!(f.output(), 3.0);
    }
}
