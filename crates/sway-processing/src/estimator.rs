//! Motion estimator: raw inertial samples to planar displacement
//!
//! The estimator first averages a short resting window into a baseline. Every
//! later sample is oriented, filtered and integrated by the configured
//! [`EstimationMode`], then passed through the small-motion boost and the
//! artifact limit shared by both modes.

use crate::config::{EstimationMode, MotionConfig};
use crate::filters::{HighPassFilter, SampleFilter};
use crate::pipeline::AccelerationConditioner;
use std::f64::consts::PI;
use sway_core::RawSample;

/// Standard gravity in mm/s²
pub const GRAVITY_MM_S2: f64 = 9806.65;

/// Output of one estimator step; all zeros while calibrating
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionOutput {
    pub ax: f64,
    pub ay: f64,
    pub vx: f64,
    pub vy: f64,
    pub sx: f64,
    pub sy: f64,
    pub sx_raw: f64,
    pub sy_raw: f64,
    pub has_artifact: bool,
}

/// Resting orientation and acceleration learned during calibration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Baseline {
    pub angle_x_deg: f64,
    pub angle_y_deg: f64,
    pub acc_x_g: f64,
    pub acc_y_g: f64,
    pub acc_z_g: f64,
}

#[derive(Debug, Clone, Default)]
struct Calibration {
    sums: Baseline,
    count: usize,
    baseline: Option<Baseline>,
}

impl Calibration {
    /// Accumulate one sample; returns true when the window just completed
    fn accumulate(&mut self, sample: &RawSample, window: usize) -> bool {
        self.sums.angle_x_deg += sample.angle_x_deg;
        self.sums.angle_y_deg += sample.angle_y_deg;
        self.sums.acc_x_g += sample.acc_x_g;
        self.sums.acc_y_g += sample.acc_y_g;
        self.sums.acc_z_g += sample.acc_z_g;
        self.count += 1;

        if self.count < window {
            return false;
        }

        let n = self.count as f64;
        self.baseline = Some(Baseline {
            angle_x_deg: self.sums.angle_x_deg / n,
            angle_y_deg: self.sums.angle_y_deg / n,
            acc_x_g: self.sums.acc_x_g / n,
            acc_y_g: self.sums.acc_y_g / n,
            acc_z_g: self.sums.acc_z_g / n,
        });
        true
    }
}

/// Per-axis spring-damper state
#[derive(Debug, Clone, Copy, Default)]
struct Resonator {
    velocity: f64,
    position: f64,
    raw_velocity: f64,
    raw_position: f64,
}

impl Resonator {
    fn step(&mut self, accel: f64, omega: f64, zeta: f64, dt: f64) {
        let a_sys = -omega * omega * self.position - 2.0 * zeta * omega * self.velocity + accel;
        self.velocity += a_sys * dt;
        self.position += self.velocity * dt;

        self.raw_velocity += accel * dt;
        self.raw_position += self.raw_velocity * dt;
    }
}

/// Per-axis finite-difference state for angle tracking
#[derive(Debug, Clone, Copy, Default)]
struct Differentiator {
    position: f64,
    velocity: f64,
}

impl Differentiator {
    /// Returns (velocity, acceleration) for the new position
    fn step(&mut self, position: f64, dt: f64) -> (f64, f64) {
        let velocity = (position - self.position) / dt;
        let accel = (velocity - self.velocity) / dt;
        self.position = position;
        self.velocity = velocity;
        (velocity, accel)
    }
}

enum MotionModel {
    Resonant {
        conditioner: AccelerationConditioner,
        axes: [Resonator; 2],
        omega: f64,
        zeta: f64,
    },
    Angle {
        highpass: [HighPassFilter; 2],
        axes: [Differentiator; 2],
        mm_per_deg: [f64; 2],
    },
}

impl MotionModel {
    fn from_config(config: &MotionConfig) -> Self {
        match config.mode {
            EstimationMode::ResonantIntegration => MotionModel::Resonant {
                conditioner: AccelerationConditioner::from_config(config),
                axes: [Resonator::default(); 2],
                omega: 2.0 * PI * config.natural_frequency_hz,
                zeta: config.damping_ratio,
            },
            EstimationMode::AngleTracking => MotionModel::Angle {
                highpass: [
                    HighPassFilter::new(config.angle_highpass_cutoff_hz),
                    HighPassFilter::new(config.angle_highpass_cutoff_hz),
                ],
                axes: [Differentiator::default(); 2],
                mm_per_deg: [config.angle_to_mm_x, config.angle_to_mm_y],
            },
        }
    }

    fn reset(&mut self) {
        match self {
            MotionModel::Resonant { conditioner, axes, .. } => {
                conditioner.reset();
                *axes = [Resonator::default(); 2];
            }
            MotionModel::Angle { highpass, axes, .. } => {
                highpass.iter_mut().for_each(|f| f.reset());
                *axes = [Differentiator::default(); 2];
            }
        }
    }
}

/// Kinematics of one step before the boost and limit
struct Kinematics {
    accel: [f64; 2],
    velocity: [f64; 2],
    position: [f64; 2],
    raw_position: [f64; 2],
}

/// Per-sample displacement estimator
pub struct MotionEstimator {
    config: MotionConfig,
    calibration: Calibration,
    model: MotionModel,
    last_timestamp: Option<f64>,
    samples_processed: u64,
}

impl MotionEstimator {
    pub fn new(config: MotionConfig) -> Self {
        let model = MotionModel::from_config(&config);
        MotionEstimator {
            config,
            calibration: Calibration::default(),
            model,
            last_timestamp: None,
            samples_processed: 0,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.baseline.is_some()
    }

    /// Baseline learned during calibration, if complete
    pub fn baseline(&self) -> Option<Baseline> {
        self.calibration.baseline
    }

    /// Samples processed since calibration completed
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// Drop the baseline and all filter/integrator state
    pub fn reset(&mut self) {
        self.calibration = Calibration::default();
        self.model.reset();
        self.last_timestamp = None;
        self.samples_processed = 0;
    }

    /// Process one raw sample
    pub fn process(&mut self, sample: &RawSample) -> MotionOutput {
        let Some(baseline) = self.calibration.baseline else {
            if self.calibration.accumulate(sample, self.config.calibration_samples) {
                self.model.reset();
                self.last_timestamp = None;
                tracing::debug!(
                    samples = self.calibration.count,
                    "Motion estimator calibrated"
                );
            }
            return MotionOutput::default();
        };

        let dt = self.step_interval(sample.timestamp_sec);
        self.samples_processed += 1;

        let kinematics = match &mut self.model {
            MotionModel::Resonant { conditioner, axes, omega, zeta } => {
                let (x, y) = orient(
                    &self.config,
                    sample.acc_x_g - baseline.acc_x_g,
                    sample.acc_y_g - baseline.acc_y_g,
                );
                let (fx, fy) = conditioner.process(x, y, dt);
                let accel = [fx * GRAVITY_MM_S2, fy * GRAVITY_MM_S2];

                for (axis, a) in axes.iter_mut().zip(accel) {
                    axis.step(a, *omega, *zeta, dt);
                }

                Kinematics {
                    accel,
                    velocity: [axes[0].velocity, axes[1].velocity],
                    position: [axes[0].position, axes[1].position],
                    raw_position: [axes[0].raw_position, axes[1].raw_position],
                }
            }
            MotionModel::Angle { highpass, axes, mm_per_deg } => {
                let (dx, dy) = orient(
                    &self.config,
                    sample.angle_x_deg - baseline.angle_x_deg,
                    sample.angle_y_deg - baseline.angle_y_deg,
                );
                let position = [
                    highpass[0].process(dx, dt) * mm_per_deg[0],
                    highpass[1].process(dy, dt) * mm_per_deg[1],
                ];
                let (vx, ax) = axes[0].step(position[0], dt);
                let (vy, ay) = axes[1].step(position[1], dt);

                Kinematics {
                    accel: [ax, ay],
                    velocity: [vx, vy],
                    position,
                    raw_position: position,
                }
            }
        };

        self.finish(kinematics)
    }

    fn step_interval(&mut self, timestamp: f64) -> f64 {
        let dt = match self.last_timestamp {
            Some(prev) => (timestamp - prev).clamp(self.config.min_dt_sec, self.config.max_dt_sec),
            None => self.config.nominal_dt(),
        };
        self.last_timestamp = Some(timestamp);
        dt
    }

    /// Small-motion boost, display scaling and the artifact limit
    fn finish(&self, k: Kinematics) -> MotionOutput {
        let factor = self.boost_factor(k.position[0].hypot(k.position[1]));
        let display_x = k.position[0] * factor * self.config.display_scale;
        let display_y = k.position[1] * factor * self.config.display_scale;

        let limit = self.config.position_limit_mm;
        let has_artifact = display_x.abs() > limit || display_y.abs() > limit;

        MotionOutput {
            ax: k.accel[0],
            ay: k.accel[1],
            vx: k.velocity[0],
            vy: k.velocity[1],
            sx: display_x.clamp(-limit, limit),
            sy: display_y.clamp(-limit, limit),
            sx_raw: k.raw_position[0],
            sy_raw: k.raw_position[1],
            has_artifact,
        }
    }

    fn boost_factor(&self, magnitude: f64) -> f64 {
        let threshold = self.config.small_motion_threshold_mm;
        if magnitude >= threshold {
            return 1.0;
        }
        let gain = self.config.small_motion_gain;
        let u = magnitude / threshold;
        let blend = u * u * (3.0 - 2.0 * u);
        gain + (1.0 - gain) * blend
    }
}

/// Apply per-axis inversion, then the optional axis swap
fn orient(config: &MotionConfig, x: f64, y: f64) -> (f64, f64) {
    let x = if config.invert_x { -x } else { x };
    let y = if config.invert_y { -y } else { y };
    if config.swap_axes {
        (y, x)
    } else {
        (x, y)
    }
}
