//! Automatic trial start once the subject leaves a resting posture

use serde::{Deserialize, Serialize};
use sway_core::{config_error, RawSample, SwayResult};

/// Autostart parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutostartConfig {
    /// Displacement from the resting baseline that starts a trial (mm)
    pub threshold_mm: f64,
    /// Samples used to learn the baseline before the trigger can fire
    pub baseline_samples: usize,
    /// Exponential smoothing factor of the baseline
    pub baseline_smoothing: f64,
    pub angle_to_mm_x: f64,
    pub angle_to_mm_y: f64,
    /// Trial length; `None` uses the controller default
    pub trial_duration_sec: Option<f64>,
}

impl Default for AutostartConfig {
    fn default() -> Self {
        AutostartConfig {
            threshold_mm: 5.0,
            baseline_samples: 10,
            baseline_smoothing: 0.1,
            angle_to_mm_x: 4.3,
            angle_to_mm_y: 4.3,
            trial_duration_sec: None,
        }
    }
}

impl AutostartConfig {
    pub fn validate(&self) -> SwayResult<()> {
        if !(self.threshold_mm > 0.0) {
            return Err(config_error!("Autostart threshold must be positive"));
        }
        if self.baseline_samples == 0 {
            return Err(config_error!("Autostart needs at least one baseline sample"));
        }
        if !(self.baseline_smoothing > 0.0 && self.baseline_smoothing <= 1.0) {
            return Err(config_error!(
                "Baseline smoothing {} must be in (0, 1]",
                self.baseline_smoothing
            ));
        }
        if !(self.angle_to_mm_x > 0.0 && self.angle_to_mm_y > 0.0) {
            return Err(config_error!("Angle scale factors must be positive"));
        }
        if let Some(duration) = self.trial_duration_sec {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(config_error!("Autostart trial duration {}s must be positive", duration));
            }
        }
        Ok(())
    }
}

/// One-shot trigger; disarms itself when it fires
#[derive(Debug, Clone)]
pub struct AutostartTrigger {
    config: AutostartConfig,
    armed: bool,
    baseline: Option<(f64, f64)>,
    samples_seen: usize,
}

impl AutostartTrigger {
    pub fn new(config: AutostartConfig) -> SwayResult<Self> {
        config.validate()?;
        Ok(AutostartTrigger {
            config,
            armed: false,
            baseline: None,
            samples_seen: 0,
        })
    }

    pub fn config(&self) -> &AutostartConfig {
        &self.config
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm and relearn the baseline from scratch
    pub fn arm(&mut self) {
        self.armed = true;
        self.baseline = None;
        self.samples_seen = 0;
        tracing::info!(threshold_mm = self.config.threshold_mm, "Autostart armed");
    }

    pub fn disarm(&mut self) {
        if self.armed {
            tracing::info!("Autostart disarmed");
        }
        self.armed = false;
    }

    /// Feed a sample; returns true exactly when a trial should start.
    ///
    /// The first `baseline_samples` samples are smoothed into the resting
    /// baseline. Later samples are compared against it and never move it.
    pub fn observe(&mut self, sample: &RawSample) -> bool {
        if !self.armed {
            return false;
        }

        let angles = (sample.angle_x_deg, sample.angle_y_deg);
        if self.samples_seen < self.config.baseline_samples {
            let alpha = self.config.baseline_smoothing;
            self.baseline = Some(match self.baseline {
                None => angles,
                Some(b) => (b.0 + alpha * (angles.0 - b.0), b.1 + alpha * (angles.1 - b.1)),
            });
            self.samples_seen += 1;
            return false;
        }

        let Some(baseline) = self.baseline else {
            return false;
        };
        let displacement = self.displacement_mm(baseline, angles);
        if displacement <= self.config.threshold_mm {
            return false;
        }

        self.armed = false;
        tracing::info!(
            displacement_mm = displacement,
            timestamp_sec = sample.timestamp_sec,
            "Autostart triggered"
        );
        true
    }

    fn displacement_mm(&self, baseline: (f64, f64), angles: (f64, f64)) -> f64 {
        let dx = (angles.0 - baseline.0) * self.config.angle_to_mm_x;
        let dy = (angles.1 - baseline.1) * self.config.angle_to_mm_y;
        dx.hypot(dy)
    }
}
