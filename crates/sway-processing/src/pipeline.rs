//! Filter chains and the two-axis acceleration conditioner

use crate::config::MotionConfig;
use crate::filters::{DeadZone, HighPassFilter, LowPassFilter, SampleFilter};

/// Ordered chain of filters applied to one channel
pub struct FilterChain {
    name: String,
    filters: Vec<Box<dyn SampleFilter>>,
}

/// Builder for constructing filter chains
pub struct FilterChainBuilder {
    name: String,
    filters: Vec<Box<dyn SampleFilter>>,
}

impl FilterChain {
    /// Create new empty chain
    pub fn new(name: &str) -> Self {
        FilterChain {
            name: name.to_string(),
            filters: Vec::new(),
        }
    }

    /// Add filter to the end of the chain
    pub fn add_filter(&mut self, filter: Box<dyn SampleFilter>) {
        self.filters.push(filter);
    }

    /// Pass one value through every filter in order
    pub fn process(&mut self, input: f64, dt: f64) -> f64 {
        self.filters
            .iter_mut()
            .fold(input, |value, filter| filter.process(value, dt))
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Names of the filters in execution order
    pub fn filter_names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }
}

impl FilterChainBuilder {
    pub fn new(name: &str) -> Self {
        FilterChainBuilder {
            name: name.to_string(),
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn SampleFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn lowpass(self, cutoff_hz: f64) -> Self {
        self.add_filter(Box::new(LowPassFilter::new(cutoff_hz)))
    }

    pub fn highpass(self, cutoff_hz: f64) -> Self {
        self.add_filter(Box::new(HighPassFilter::new(cutoff_hz)))
    }

    pub fn dead_zone(self, threshold: f64) -> Self {
        self.add_filter(Box::new(DeadZone::new(threshold)))
    }

    pub fn build(self) -> FilterChain {
        let mut chain = FilterChain::new(&self.name);
        for filter in self.filters {
            chain.add_filter(filter);
        }
        chain
    }
}

/// Band-pass and noise floor for the two horizontal acceleration axes.
///
/// Each axis is low-passed, the axes are optionally decorrelated from each
/// other, and each is then high-passed and passed through the dead zone.
pub struct AccelerationConditioner {
    smoothing: [FilterChain; 2],
    detrending: [FilterChain; 2],
    cross_axis: f64,
}

impl AccelerationConditioner {
    pub fn from_config(config: &MotionConfig) -> Self {
        let smoothing = |axis: &str| {
            FilterChainBuilder::new(&format!("{axis}_smoothing"))
                .lowpass(config.lowpass_cutoff_hz)
                .build()
        };
        let detrending = |axis: &str| {
            FilterChainBuilder::new(&format!("{axis}_detrending"))
                .highpass(config.highpass_cutoff_hz)
                .dead_zone(config.dead_zone_g)
                .build()
        };

        AccelerationConditioner {
            smoothing: [smoothing("x"), smoothing("y")],
            detrending: [detrending("x"), detrending("y")],
            cross_axis: config.cross_axis_decorrelation,
        }
    }

    /// Condition one (x, y) acceleration pair in g
    pub fn process(&mut self, x: f64, y: f64, dt: f64) -> (f64, f64) {
        let sx = self.smoothing[0].process(x, dt);
        let sy = self.smoothing[1].process(y, dt);

        let (dx, dy) = if self.cross_axis != 0.0 {
            (sx - self.cross_axis * sy, sy - self.cross_axis * sx)
        } else {
            (sx, sy)
        };

        (
            self.detrending[0].process(dx, dt),
            self.detrending[1].process(dy, dt),
        )
    }

    pub fn reset(&mut self) {
        for chain in self.smoothing.iter_mut().chain(self.detrending.iter_mut()) {
            chain.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_builder() {
        let chain = FilterChainBuilder::new("test")
            .lowpass(5.0)
            .highpass(0.1)
            .dead_zone(0.002)
            .build();

        assert_eq!(chain.name(), "test");
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.filter_names(), vec!["lowpass", "highpass", "dead_zone"]);
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let mut chain = FilterChain::new("empty");
        assert!(chain.is_empty());
        assert_eq!(chain.process(1.25, 0.02), 1.25);
    }

    #[test]
    fn test_conditioner_removes_constant_offset() {
        let mut conditioner = AccelerationConditioner::from_config(&MotionConfig::default());
        for _ in 0..100 {
            let (x, y) = conditioner.process(0.05, -0.03, 0.02);
            assert_eq!((x, y), (0.0, 0.0));
        }
    }

    #[test]
    fn test_conditioner_passes_motion() {
        let mut conditioner = AccelerationConditioner::from_config(&MotionConfig::default());
        conditioner.process(0.0, 0.0, 0.02);
        let mut peak: f64 = 0.0;
        for i in 1..100 {
            let t = i as f64 * 0.02;
            let (x, _) = conditioner.process(0.05 * (2.0 * std::f64::consts::PI * t).sin(), 0.0, 0.02);
            peak = peak.max(x.abs());
        }
        assert!(peak > 0.02);
    }

    #[test]
    fn test_cross_axis_decorrelation() {
        let config = MotionConfig {
            cross_axis_decorrelation: 0.5,
            ..MotionConfig::default()
        };
        let mut coupled = AccelerationConditioner::from_config(&config);
        let mut plain = AccelerationConditioner::from_config(&MotionConfig::default());

        coupled.process(0.0, 0.0, 0.02);
        plain.process(0.0, 0.0, 0.02);
        let (cx, cy) = coupled.process(0.1, 0.1, 0.02);
        let (px, py) = plain.process(0.1, 0.1, 0.02);
        assert!(cx < px);
        assert!(cy < py);
    }
}
