//! Single-pole filters for irregularly sampled sensor streams

use std::f64::consts::PI;

/// A per-sample filter driven by a time-varying sample interval
pub trait SampleFilter: Send {
    /// Filter one value observed `dt` seconds after the previous one
    fn process(&mut self, input: f64, dt: f64) -> f64;

    /// Forget all history; the next call behaves like the first
    fn reset(&mut self);

    /// Filter name for logging
    fn name(&self) -> &str;
}

/// RC time constant for a cutoff frequency
pub fn time_constant(cutoff_hz: f64) -> f64 {
    1.0 / (2.0 * PI * cutoff_hz)
}

/// First-order low-pass filter
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    rc: f64,
    output: Option<f64>,
}

impl LowPassFilter {
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            rc: time_constant(cutoff_hz),
            output: None,
        }
    }
}

impl SampleFilter for LowPassFilter {
    fn process(&mut self, input: f64, dt: f64) -> f64 {
        match self.output {
            None => {
                self.output = Some(input);
                input
            }
            Some(prev) => {
                let alpha = dt / (self.rc + dt);
                let y = prev + alpha * (input - prev);
                self.output = Some(y);
                y
            }
        }
    }

    fn reset(&mut self) {
        self.output = None;
    }

    fn name(&self) -> &str {
        "lowpass"
    }
}

/// First-order high-pass filter.
///
/// The first call only records the input and returns 0, so a constant offset
/// present at start-up never produces a transient.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    rc: f64,
    prev_input: Option<f64>,
    prev_output: f64,
}

impl HighPassFilter {
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            rc: time_constant(cutoff_hz),
            prev_input: None,
            prev_output: 0.0,
        }
    }
}

impl SampleFilter for HighPassFilter {
    fn process(&mut self, input: f64, dt: f64) -> f64 {
        let Some(prev_input) = self.prev_input else {
            self.prev_input = Some(input);
            self.prev_output = 0.0;
            return 0.0;
        };

        let alpha = self.rc / (self.rc + dt);
        let y = alpha * (self.prev_output + input - prev_input);
        self.prev_input = Some(input);
        self.prev_output = y;
        y
    }

    fn reset(&mut self) {
        self.prev_input = None;
        self.prev_output = 0.0;
    }

    fn name(&self) -> &str {
        "highpass"
    }
}

/// Soft-knee noise floor.
///
/// Zero below `threshold`, unchanged from `2 * threshold` up, and a linear
/// ramp between the two so the output stays continuous.
#[derive(Debug, Clone, Copy)]
pub struct DeadZone {
    threshold: f64,
}

impl DeadZone {
    pub fn new(threshold: f64) -> Self {
        Self { threshold: threshold.abs() }
    }

    pub fn apply(&self, x: f64) -> f64 {
        let t = self.threshold;
        let magnitude = x.abs();
        if magnitude < t {
            0.0
        } else if magnitude < 2.0 * t {
            x.signum() * 2.0 * (magnitude - t)
        } else {
            x
        }
    }
}

impl SampleFilter for DeadZone {
    fn process(&mut self, input: f64, _dt: f64) -> f64 {
        self.apply(input)
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "dead_zone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.02;

    #[test]
    fn test_lowpass_seeds_with_first_input() {
        let mut filter = LowPassFilter::new(5.0);
        assert_eq!(filter.process(3.0, DT), 3.0);
        assert_eq!(filter.process(3.0, DT), 3.0);
    }

    #[test]
    fn test_lowpass_converges_to_constant() {
        let mut filter = LowPassFilter::new(2.0);
        filter.process(0.0, DT);
        let mut y = 0.0;
        for _ in 0..500 {
            y = filter.process(1.0, DT);
        }
        assert!((y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_highpass_first_output_is_zero() {
        let mut filter = HighPassFilter::new(0.1);
        assert_eq!(filter.process(0.8, DT), 0.0);
        // Constant input after the seed produces nothing
        assert_eq!(filter.process(0.8, DT), 0.0);
    }

    #[test]
    fn test_highpass_decays_step() {
        let mut filter = HighPassFilter::new(0.5);
        filter.process(0.0, DT);
        let first = filter.process(1.0, DT);
        assert!(first > 0.9);

        let mut y = first;
        for _ in 0..1000 {
            y = filter.process(1.0, DT);
        }
        assert!(y.abs() < 1e-3);
    }

    #[test]
    fn test_reset_restores_cold_start() {
        let mut lowpass = LowPassFilter::new(1.0);
        lowpass.process(10.0, DT);
        lowpass.process(0.0, DT);
        lowpass.reset();
        assert_eq!(lowpass.process(-4.0, DT), -4.0);

        let mut highpass = HighPassFilter::new(1.0);
        highpass.process(0.0, DT);
        highpass.process(5.0, DT);
        highpass.reset();
        assert_eq!(highpass.process(7.0, DT), 0.0);
    }

    #[test]
    fn test_variable_dt() {
        // A longer step moves a low-pass further toward the input
        let mut short = LowPassFilter::new(1.0);
        let mut long = LowPassFilter::new(1.0);
        short.process(0.0, DT);
        long.process(0.0, DT);
        assert!(long.process(1.0, 0.1) > short.process(1.0, 0.01));
    }

    #[test]
    fn test_dead_zone_regions() {
        let zone = DeadZone::new(0.002);
        assert_eq!(zone.apply(0.001), 0.0);
        assert_eq!(zone.apply(-0.0019), 0.0);
        assert!((zone.apply(0.003) - 0.002).abs() < 1e-12);
        assert!((zone.apply(-0.003) + 0.002).abs() < 1e-12);
        assert_eq!(zone.apply(0.01), 0.01);
    }

    #[test]
    fn test_dead_zone_continuity() {
        let zone = DeadZone::new(0.002);
        let eps = 1e-9;
        assert!((zone.apply(0.002 - eps) - zone.apply(0.002)).abs() < 1e-6);
        assert!((zone.apply(0.004 - eps) - zone.apply(0.004)).abs() < 1e-6);
        assert!((zone.apply(-0.004 + eps) - zone.apply(-0.004)).abs() < 1e-6);
    }
}
