//! Sample processor: estimator output stamped with trial time

use crate::config::MotionConfig;
use crate::estimator::MotionEstimator;
use sway_core::{ProcessedSample, RawSample};

/// Wraps the motion estimator with elapsed-time bookkeeping.
///
/// Samples consumed by calibration produce nothing. The first sample
/// processed after calibration defines `t = 0`.
pub struct SampleProcessor {
    estimator: MotionEstimator,
    origin: Option<f64>,
    last_t: f64,
}

impl SampleProcessor {
    pub fn new(config: MotionConfig) -> Self {
        SampleProcessor {
            estimator: MotionEstimator::new(config),
            origin: None,
            last_t: 0.0,
        }
    }

    /// Process one raw sample; `None` while the estimator is calibrating
    pub fn process(&mut self, sample: &RawSample) -> Option<ProcessedSample> {
        let was_calibrated = self.estimator.is_calibrated();
        let out = self.estimator.process(sample);
        if !was_calibrated {
            return None;
        }

        let origin = *self.origin.get_or_insert(sample.timestamp_sec);
        // Out-of-order timestamps must not move trial time backwards
        let t = (sample.timestamp_sec - origin).max(self.last_t);
        self.last_t = t;

        Some(ProcessedSample {
            t,
            ax_mm: out.ax,
            ay_mm: out.ay,
            vx_mm: out.vx,
            vy_mm: out.vy,
            sx_mm: out.sx,
            sy_mm: out.sy,
            sx_mm_raw: out.sx_raw,
            sy_mm_raw: out.sy_raw,
            has_artifact: out.has_artifact,
        })
    }

    /// Clear the time origin and the estimator
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.origin = None;
        self.last_t = 0.0;
    }

    pub fn is_calibrated(&self) -> bool {
        self.estimator.is_calibrated()
    }
}
