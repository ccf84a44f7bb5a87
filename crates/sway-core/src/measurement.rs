//! Trial metrics, results and the observable measurement state

use crate::samples::ProcessedSample;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one timed trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MeasurementStatus {
    /// No trial in progress
    #[default]
    Idle,
    /// Trial started, estimator still learning its baseline
    Calibrating,
    /// Samples are being accumulated
    Running,
    /// Trial duration reached or trial stopped; result available
    Finished,
}

impl MeasurementStatus {
    /// True while samples are accepted
    pub fn is_active(&self) -> bool {
        matches!(self, MeasurementStatus::Calibrating | MeasurementStatus::Running)
    }
}

/// The three clinical balance metrics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementMetrics {
    /// Path-length based stability, 0..=100
    pub stability: f64,
    /// Amplitude events per second, scaled by the correction factor
    pub oscillation_frequency: f64,
    /// Motion magnitude weighted by its irregularity
    pub coordination_factor: f64,
}

/// Frequency summary of one axis of the displacement trace
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisSpectrum {
    pub peak_frequency_hz: f64,
    pub mean_frequency_hz: f64,
    pub total_power: f64,
}

/// Frequency summary of a finished trial
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwaySpectrum {
    pub x: AxisSpectrum,
    pub y: AxisSpectrum,
    /// Sample rate estimated from the trace timestamps
    pub sample_rate_hz: f64,
}

/// Terminal outcome of a trial
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub metrics: MeasurementMetrics,
    pub duration_sec: f64,
    pub samples: Vec<ProcessedSample>,
    #[serde(default)]
    pub spectrum: Option<SwaySpectrum>,
}

/// Externally observable snapshot of the measurement controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementState {
    pub status: MeasurementStatus,
    pub elapsed_sec: f64,
    pub processed_samples: Vec<ProcessedSample>,
    pub metrics: MeasurementMetrics,
    /// Populated only when `status` is `Finished`
    pub result: Option<MeasurementResult>,
    pub is_valid: bool,
    pub validation_message: Option<String>,
}

impl Default for MeasurementState {
    fn default() -> Self {
        Self {
            status: MeasurementStatus::Idle,
            elapsed_sec: 0.0,
            processed_samples: Vec::new(),
            metrics: MeasurementMetrics::default(),
            result: None,
            is_valid: true,
            validation_message: None,
        }
    }
}

impl MeasurementState {
    /// Fresh snapshot for a trial that was just started
    pub fn started() -> Self {
        Self {
            status: MeasurementStatus::Calibrating,
            ..Default::default()
        }
    }

    /// Number of processed samples in this snapshot
    pub fn sample_count(&self) -> usize {
        self.processed_samples.len()
    }
}

/// Opaque identifier handed out by persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementId(Uuid);

impl MeasurementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MeasurementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for MeasurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementStatus::Idle => write!(f, "Idle"),
            MeasurementStatus::Calibrating => write!(f, "Calibrating"),
            MeasurementStatus::Running => write!(f, "Running"),
            MeasurementStatus::Finished => write!(f, "Finished"),
        }
    }
}
