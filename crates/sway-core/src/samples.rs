//! Sensor samples and processed displacement samples

use serde::{Deserialize, Serialize};

/// One inertial sensor reading as delivered by the transport.
///
/// Acceleration is in g, orientation angles in degrees. Timestamps are
/// monotonic seconds on the sensor clock and may have irregular gaps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp_sec: f64,
    pub acc_x_g: f64,
    pub acc_y_g: f64,
    pub acc_z_g: f64,
    pub angle_x_deg: f64,
    pub angle_y_deg: f64,
}

impl RawSample {
    /// Create a sample from acceleration and angle triples
    pub fn new(timestamp_sec: f64, acc_g: [f64; 3], angle_deg: [f64; 2]) -> Self {
        Self {
            timestamp_sec,
            acc_x_g: acc_g[0],
            acc_y_g: acc_g[1],
            acc_z_g: acc_g[2],
            angle_x_deg: angle_deg[0],
            angle_y_deg: angle_deg[1],
        }
    }

    /// Sensor lying flat and still: gravity on Z only
    pub fn at_rest(timestamp_sec: f64) -> Self {
        Self::new(timestamp_sec, [0.0, 0.0, 1.0], [0.0, 0.0])
    }

    /// Copy of this sample re-stamped at another time
    pub fn with_timestamp(mut self, timestamp_sec: f64) -> Self {
        self.timestamp_sec = timestamp_sec;
        self
    }
}

/// One sample of the estimated displacement trace.
///
/// `sx_mm`/`sy_mm` are clamped to the artifact limit for display while
/// `sx_mm_raw`/`sy_mm_raw` keep the unbounded estimate used by the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessedSample {
    /// Seconds since the first sample accepted after calibration
    pub t: f64,
    /// Filtered acceleration (mm/s²)
    pub ax_mm: f64,
    pub ay_mm: f64,
    /// Velocity (mm/s)
    pub vx_mm: f64,
    pub vy_mm: f64,
    /// Display position (mm), always within the artifact limit
    pub sx_mm: f64,
    pub sy_mm: f64,
    /// Unclamped position (mm)
    pub sx_mm_raw: f64,
    pub sy_mm_raw: f64,
    pub has_artifact: bool,
}

impl ProcessedSample {
    /// Euclidean distance between the unclamped positions of two samples
    pub fn raw_distance_to(&self, other: &ProcessedSample) -> f64 {
        let dx = other.sx_mm_raw - self.sx_mm_raw;
        let dy = other.sy_mm_raw - self.sy_mm_raw;
        (dx * dx + dy * dy).sqrt()
    }
}
