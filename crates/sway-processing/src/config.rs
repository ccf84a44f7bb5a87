//! Configuration management for sway measurement

use serde::{Deserialize, Serialize};
use sway_core::{config_error, SwayError, SwayResult};

/// Strategy used to turn raw samples into displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EstimationMode {
    /// Band-passed acceleration through a damped spring model
    #[default]
    ResonantIntegration,
    /// High-passed orientation angle scaled to millimetres
    AngleTracking,
}

/// Motion estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    pub mode: EstimationMode,
    /// Sample rate assumed for the first post-calibration step (Hz)
    pub nominal_sample_rate_hz: f64,
    /// Samples averaged into the resting baseline
    pub calibration_samples: usize,
    /// Bounds applied to every integration step (s)
    pub min_dt_sec: f64,
    pub max_dt_sec: f64,
    /// Axis orientation relative to the platform
    pub invert_x: bool,
    pub invert_y: bool,
    pub swap_axes: bool,
    /// Acceleration band-pass (Hz)
    pub lowpass_cutoff_hz: f64,
    pub highpass_cutoff_hz: f64,
    /// Fraction of the other axis subtracted after low-pass; 0 disables
    pub cross_axis_decorrelation: f64,
    /// Acceleration noise floor (g)
    pub dead_zone_g: f64,
    /// Spring-damper model
    pub natural_frequency_hz: f64,
    pub damping_ratio: f64,
    /// Displacements below this magnitude are amplified by `small_motion_gain`
    pub small_motion_threshold_mm: f64,
    pub small_motion_gain: f64,
    pub display_scale: f64,
    /// Plausibility limit; larger display positions are artifacts (mm)
    pub position_limit_mm: f64,
    /// Angle tracking parameters
    pub angle_highpass_cutoff_hz: f64,
    pub angle_to_mm_x: f64,
    pub angle_to_mm_y: f64,
}

/// Metrics engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Extremum magnitude, swing and amplitude threshold for frequency (mm)
    pub frequency_amplitude_threshold_mm: f64,
    pub frequency_correction_factor: f64,
    pub frequency_min_index_gap: usize,
    /// Amplitude threshold for the coordination factor (mm)
    pub coordination_threshold_mm: f64,
    pub coordination_swing_multiplier: f64,
    pub coordination_min_index_gap: usize,
    pub coordination_amplitude_cap_mm: f64,
    pub coordination_scaling_coefficient: f64,
    /// Amplitude sums below this are treated as standing still (mm)
    pub small_motion_floor_mm: f64,
    pub coordination_baseline: f64,
    pub coordination_min_samples: usize,
    /// Chaos coefficient weights
    pub irregularity_weight: f64,
    pub jitter_weight: f64,
    pub discordance_weight: f64,
}

/// Trial controller parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub default_duration_sec: f64,
    /// Largest tolerated interval between consecutive samples (s)
    pub max_gap_sec: f64,
    /// Floor for durations used as divisors (s)
    pub duration_epsilon_sec: f64,
}

/// Complete measurement configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Configuration name/profile
    pub name: String,
    pub motion: MotionConfig,
    pub metrics: MetricsConfig,
    pub controller: ControllerConfig,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            mode: EstimationMode::ResonantIntegration,
            nominal_sample_rate_hz: 50.0,
            calibration_samples: 10,
            min_dt_sec: 0.01,
            max_dt_sec: 0.1,
            invert_x: false,
            invert_y: true,
            swap_axes: false,
            lowpass_cutoff_hz: 5.0,
            highpass_cutoff_hz: 0.1,
            cross_axis_decorrelation: 0.0,
            dead_zone_g: 0.002,
            natural_frequency_hz: 3.0,
            damping_ratio: 0.7,
            small_motion_threshold_mm: 5.0,
            small_motion_gain: 1.5,
            display_scale: 1.0,
            position_limit_mm: 40.0,
            angle_highpass_cutoff_hz: 0.1,
            angle_to_mm_x: 4.3,
            angle_to_mm_y: 4.3,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            frequency_amplitude_threshold_mm: 3.0,
            frequency_correction_factor: 0.30,
            frequency_min_index_gap: 2,
            coordination_threshold_mm: 1.5,
            coordination_swing_multiplier: 1.5,
            coordination_min_index_gap: 3,
            coordination_amplitude_cap_mm: 30.0,
            coordination_scaling_coefficient: 0.60,
            small_motion_floor_mm: 5.0,
            coordination_baseline: 10.0,
            coordination_min_samples: 10,
            irregularity_weight: 0.25,
            jitter_weight: 0.15,
            discordance_weight: 0.15,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            default_duration_sec: 10.0,
            max_gap_sec: 0.1,
            duration_epsilon_sec: 1e-4,
        }
    }
}

impl MotionConfig {
    /// Nominal sampling interval (s)
    pub fn nominal_dt(&self) -> f64 {
        1.0 / self.nominal_sample_rate_hz
    }

    /// Validate estimator parameters
    pub fn validate(&self) -> SwayResult<()> {
        if !(self.nominal_sample_rate_hz > 0.0) {
            return Err(config_error!("Nominal sample rate must be positive"));
        }
        if self.calibration_samples == 0 {
            return Err(config_error!("Calibration window must contain at least one sample"));
        }
        if !(self.min_dt_sec > 0.0) || self.max_dt_sec < self.min_dt_sec {
            return Err(config_error!(
                "Step bounds [{}, {}] s are not a valid positive range",
                self.min_dt_sec, self.max_dt_sec
            ));
        }

        let nyquist = self.nominal_sample_rate_hz / 2.0;
        for (name, cutoff) in [
            ("lowpass", self.lowpass_cutoff_hz),
            ("highpass", self.highpass_cutoff_hz),
            ("angle highpass", self.angle_highpass_cutoff_hz),
        ] {
            if !(cutoff > 0.0) || cutoff >= nyquist {
                return Err(config_error!(
                    "{} cutoff {} Hz must lie in (0, {}) Hz",
                    name, cutoff, nyquist
                ));
            }
        }
        if self.highpass_cutoff_hz >= self.lowpass_cutoff_hz {
            return Err(config_error!(
                "Highpass cutoff {} Hz must be below lowpass cutoff {} Hz",
                self.highpass_cutoff_hz, self.lowpass_cutoff_hz
            ));
        }

        if !(0.0..1.0).contains(&self.cross_axis_decorrelation) {
            return Err(config_error!("Cross-axis decorrelation must be in [0, 1)"));
        }
        if self.dead_zone_g < 0.0 {
            return Err(config_error!("Dead zone cannot be negative"));
        }
        if !(self.natural_frequency_hz > 0.0) || self.damping_ratio < 0.0 {
            return Err(config_error!("Resonator needs positive frequency and non-negative damping"));
        }
        if self.small_motion_threshold_mm < 0.0 || !(self.small_motion_gain > 0.0) {
            return Err(config_error!("Small-motion boost parameters out of range"));
        }
        if !(self.display_scale > 0.0) {
            return Err(config_error!("Display scale must be positive"));
        }
        if !(self.position_limit_mm > 0.0) {
            return Err(config_error!("Position limit must be positive"));
        }
        if !(self.angle_to_mm_x > 0.0) || !(self.angle_to_mm_y > 0.0) {
            return Err(config_error!("Angle to millimetre factors must be positive"));
        }

        Ok(())
    }
}

impl MetricsConfig {
    /// Validate metrics parameters
    pub fn validate(&self) -> SwayResult<()> {
        if !(self.frequency_amplitude_threshold_mm > 0.0) || !(self.coordination_threshold_mm > 0.0) {
            return Err(config_error!("Amplitude thresholds must be positive"));
        }
        if self.frequency_correction_factor < 0.0 || self.coordination_scaling_coefficient < 0.0 {
            return Err(config_error!("Scaling factors cannot be negative"));
        }
        if self.coordination_swing_multiplier < 1.0 {
            return Err(config_error!("Coordination swing multiplier must be at least 1"));
        }
        if self.coordination_amplitude_cap_mm < self.coordination_threshold_mm {
            return Err(config_error!(
                "Amplitude cap {} mm is below the coordination threshold {} mm",
                self.coordination_amplitude_cap_mm, self.coordination_threshold_mm
            ));
        }
        if self.irregularity_weight < 0.0 || self.jitter_weight < 0.0 || self.discordance_weight < 0.0 {
            return Err(config_error!("Chaos weights cannot be negative"));
        }
        Ok(())
    }
}

impl ControllerConfig {
    /// Validate controller parameters
    pub fn validate(&self) -> SwayResult<()> {
        if !self.default_duration_sec.is_finite() || self.default_duration_sec <= 0.0 {
            return Err(SwayError::InvalidDuration {
                duration_sec: self.default_duration_sec,
            });
        }
        if !(self.max_gap_sec > 0.0) {
            return Err(config_error!("Maximum sample gap must be positive"));
        }
        if !(self.duration_epsilon_sec > 0.0) {
            return Err(config_error!("Duration epsilon must be positive"));
        }
        Ok(())
    }
}

/// Preset configurations
impl MeasurementConfig {
    /// Resonant integration tuned to match the reference balance platform
    pub fn reference_device() -> Self {
        MeasurementConfig {
            name: "Reference device".to_string(),
            motion: MotionConfig::default(),
            metrics: MetricsConfig::default(),
            controller: ControllerConfig::default(),
        }
    }

    /// Displacement from sensor tilt instead of integrated acceleration
    pub fn angle_tracking() -> Self {
        MeasurementConfig {
            name: "Angle tracking".to_string(),
            motion: MotionConfig {
                mode: EstimationMode::AngleTracking,
                ..MotionConfig::default()
            },
            metrics: MetricsConfig::default(),
            controller: ControllerConfig::default(),
        }
    }

    /// Preset for the given estimation mode
    pub fn for_mode(mode: EstimationMode) -> Self {
        match mode {
            EstimationMode::ResonantIntegration => Self::reference_device(),
            EstimationMode::AngleTracking => Self::angle_tracking(),
        }
    }

    /// Validate entire configuration
    pub fn validate(&self) -> SwayResult<()> {
        self.motion.validate()?;
        self.metrics.validate()?;
        self.controller.validate()?;

        if self.controller.max_gap_sec < self.motion.nominal_dt() {
            return Err(config_error!(
                "Maximum gap {} s is shorter than the nominal sample interval",
                self.controller.max_gap_sec
            ));
        }
        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> SwayResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SwayError::Serialization {
            reason: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> SwayResult<Self> {
        serde_json::from_str(json).map_err(|e| SwayError::Serialization {
            reason: format!("Failed to deserialize configuration: {}", e),
        })
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self::reference_device()
    }
}
