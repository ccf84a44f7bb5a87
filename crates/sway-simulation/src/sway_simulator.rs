//! Inertial sensor simulator strapped to a swaying platform

use crate::sway_patterns::SwayPattern;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use sway_core::{RawSample, SwayError, SwayResult};

/// Standard gravity in mm/s²
const GRAVITY_MM_S2: f64 = 9806.65;

/// Highest simulated sensor rate
pub const MAX_SAMPLE_RATE_HZ: f64 = 10_000.0;

/// Sensor noise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian acceleration noise standard deviation (g)
    pub accel_std_g: f64,
    /// Gaussian angle noise standard deviation (deg)
    pub angle_std_deg: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            accel_std_g: 0.0005,
            angle_std_deg: 0.02,
        }
    }
}

impl NoiseConfig {
    /// Noise-free sensor
    pub fn none() -> Self {
        Self {
            accel_std_g: 0.0,
            angle_std_deg: 0.0,
        }
    }
}

/// Constant sensor offsets, the way a strap never sits perfectly level
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorBias {
    pub acc_x_g: f64,
    pub acc_y_g: f64,
    pub angle_x_deg: f64,
    pub angle_y_deg: f64,
}

/// Configuration for sway simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Sampling rate in Hz
    pub sample_rate_hz: f64,
    /// Platform motion to simulate
    pub pattern: SwayPattern,
    pub noise: NoiseConfig,
    pub bias: SensorBias,
    /// Displacement per degree of sensor tilt (mm)
    pub mm_per_degree: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            pattern: SwayPattern::Still,
            noise: NoiseConfig::default(),
            bias: SensorBias::default(),
            mm_per_degree: 4.3,
            seed: None,
        }
    }
}

/// Sway sensor simulator
pub struct SwaySimulator {
    config: SimulatorConfig,
    rng: StdRng,
    accel_noise: Normal<f64>,
    angle_noise: Normal<f64>,
    time_offset: f64,
    pending_gap: f64,
    samples_generated: u64,
}

impl SwaySimulator {
    /// Create new simulator with configuration
    pub fn new(config: SimulatorConfig) -> SwayResult<Self> {
        Self::validate(&config)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (accel_noise, angle_noise) = Self::noise_distributions(&config.noise)?;

        Ok(SwaySimulator {
            config,
            rng,
            accel_noise,
            angle_noise,
            time_offset: 0.0,
            pending_gap: 0.0,
            samples_generated: 0,
        })
    }

    fn validate(config: &SimulatorConfig) -> SwayResult<()> {
        if !(config.sample_rate_hz > 0.0 && config.sample_rate_hz <= MAX_SAMPLE_RATE_HZ) {
            return Err(SwayError::Simulation {
                reason: format!(
                    "Sample rate {} Hz must be in (0, {}] Hz",
                    config.sample_rate_hz, MAX_SAMPLE_RATE_HZ
                ),
            });
        }
        if !(config.mm_per_degree > 0.0) {
            return Err(SwayError::Simulation {
                reason: "Millimetres per degree must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn noise_distributions(noise: &NoiseConfig) -> SwayResult<(Normal<f64>, Normal<f64>)> {
        let make = |std: f64| {
            Normal::new(0.0, std).map_err(|e| SwayError::Simulation {
                reason: format!("Failed to create normal distribution: {}", e),
            })
        };
        Ok((make(noise.accel_std_g)?, make(noise.angle_std_deg)?))
    }

    /// Produce the next sample on the simulated clock
    pub fn next_sample(&mut self) -> RawSample {
        let dt = 1.0 / self.config.sample_rate_hz;
        // Samples lost to a transport gap are skipped, not delayed
        if self.pending_gap > 0.0 {
            self.time_offset += self.pending_gap;
            self.pending_gap = 0.0;
        }

        let time = self.time_offset;
        let k = self.config.pattern.kinematics_at(time);
        let bias = &self.config.bias;

        let sample = RawSample {
            timestamp_sec: time,
            acc_x_g: k.ax_mm_s2 / GRAVITY_MM_S2 + bias.acc_x_g + self.accel_noise.sample(&mut self.rng),
            acc_y_g: k.ay_mm_s2 / GRAVITY_MM_S2 + bias.acc_y_g + self.accel_noise.sample(&mut self.rng),
            acc_z_g: 1.0 + self.accel_noise.sample(&mut self.rng),
            angle_x_deg: k.x_mm / self.config.mm_per_degree
                + bias.angle_x_deg
                + self.angle_noise.sample(&mut self.rng),
            angle_y_deg: k.y_mm / self.config.mm_per_degree
                + bias.angle_y_deg
                + self.angle_noise.sample(&mut self.rng),
        };

        self.time_offset += dt;
        self.samples_generated += 1;
        sample
    }

    /// Generate samples covering the given duration
    pub fn generate(&mut self, duration_sec: f64) -> Vec<RawSample> {
        let count = (duration_sec * self.config.sample_rate_hz).round().max(0.0) as usize;
        (0..count).map(|_| self.next_sample()).collect()
    }

    /// Drop samples so the next one arrives `gap_sec` later than it should
    pub fn inject_gap(&mut self, gap_sec: f64) {
        self.pending_gap += gap_sec.max(0.0);
    }

    /// Switch to another motion pattern without resetting the clock
    pub fn update_pattern(&mut self, pattern: SwayPattern) {
        self.config.pattern = pattern;
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.time_offset = 0.0;
        self.pending_gap = 0.0;
        self.samples_generated = 0;
    }

    /// Simulated time of the next sample
    pub fn current_time(&self) -> f64 {
        self.time_offset + self.pending_gap
    }

    pub fn samples_generated(&self) -> u64 {
        self.samples_generated
    }

    /// Get current configuration
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}
