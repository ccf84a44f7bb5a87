//! Balance metrics over a displacement trace
//!
//! Every function here is pure and works on the unclamped `*_raw`
//! coordinates, so a clipped display trace never distorts the metrics.

use crate::config::MetricsConfig;
use sway_core::{MeasurementMetrics, ProcessedSample};

/// Path length (mm) at which stability reaches zero
const STABILITY_PATH_LIMIT_MM: f64 = 4000.0;
/// Path length (mm) per stability point
const STABILITY_PATH_PER_POINT_MM: f64 = 40.0;
/// Coordination multiplier applied to smooth motion
const COORDINATION_BASE_MULTIPLIER: f64 = 0.4;
/// Jitter is compared against amplitudes at this scale
const JITTER_SCALE: f64 = 10.0;
/// Delta variance below which axes count as moving together
const DISCORDANCE_MIN_VARIANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    Peak,
    Valley,
}

/// Local extremum of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
    pub kind: ExtremumKind,
}

impl Extremum {
    /// True if `other` is the same kind and lies further out
    fn is_exceeded_by(&self, other: &Extremum) -> bool {
        match self.kind {
            ExtremumKind::Peak => other.value > self.value,
            ExtremumKind::Valley => other.value < self.value,
        }
    }
}

/// Thresholds deciding which swings count as amplitudes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeCriteria {
    /// Extrema closer to zero than this are ignored
    pub min_extremum_magnitude: f64,
    /// Smallest swing from the previous accepted extremum
    pub min_swing: f64,
    /// Smallest sample-index distance from the previous accepted extremum
    pub min_index_gap: usize,
    /// Smallest swing reported as an amplitude
    pub min_amplitude: f64,
    /// Amplitudes above this are reported as this
    pub cap: Option<f64>,
}

impl MetricsConfig {
    /// Criteria for counting oscillations
    pub fn frequency_criteria(&self) -> AmplitudeCriteria {
        let threshold = self.frequency_amplitude_threshold_mm;
        AmplitudeCriteria {
            min_extremum_magnitude: threshold,
            min_swing: threshold,
            min_index_gap: self.frequency_min_index_gap,
            min_amplitude: threshold,
            cap: None,
        }
    }

    /// Criteria for summing amplitudes into the coordination factor
    pub fn coordination_criteria(&self) -> AmplitudeCriteria {
        let threshold = self.coordination_threshold_mm;
        AmplitudeCriteria {
            min_extremum_magnitude: 0.0,
            min_swing: threshold * self.coordination_swing_multiplier,
            min_index_gap: self.coordination_min_index_gap,
            min_amplitude: threshold,
            cap: Some(self.coordination_amplitude_cap_mm),
        }
    }
}

/// Total distance travelled between consecutive raw positions (mm)
pub fn path_length(samples: &[ProcessedSample]) -> f64 {
    samples
        .windows(2)
        .map(|pair| pair[0].raw_distance_to(&pair[1]))
        .sum()
}

/// Stability score in [0, 100]; 100 means no movement at all
pub fn stability(samples: &[ProcessedSample]) -> f64 {
    if samples.len() < 2 {
        return 100.0;
    }
    let path = path_length(samples);
    ((STABILITY_PATH_LIMIT_MM - path) / STABILITY_PATH_PER_POINT_MM).clamp(0.0, 100.0)
}

/// Local extrema at least `min_magnitude` away from zero
pub fn find_extrema(values: &[f64], min_magnitude: f64) -> Vec<Extremum> {
    let mut extrema = Vec::new();
    if values.len() < 3 {
        return extrema;
    }

    let mut prev_slope = values[1] - values[0];
    for i in 1..values.len() - 1 {
        let slope = values[i + 1] - values[i];
        let kind = if prev_slope > 0.0 && slope <= 0.0 {
            Some(ExtremumKind::Peak)
        } else if prev_slope < 0.0 && slope >= 0.0 {
            Some(ExtremumKind::Valley)
        } else {
            None
        };

        if let Some(kind) = kind {
            if values[i].abs() >= min_magnitude {
                extrema.push(Extremum { index: i, value: values[i], kind });
            }
        }
        prev_slope = slope;
    }
    extrema
}

/// Swings between consecutive accepted extrema
pub fn extract_amplitudes(values: &[f64], criteria: &AmplitudeCriteria) -> Vec<f64> {
    let mut accepted: Vec<Extremum> = Vec::new();

    for candidate in find_extrema(values, criteria.min_extremum_magnitude) {
        let Some(last) = accepted.last_mut() else {
            accepted.push(candidate);
            continue;
        };

        if last.kind == candidate.kind {
            if last.is_exceeded_by(&candidate) {
                *last = candidate;
            }
            continue;
        }
        if candidate.index - last.index < criteria.min_index_gap {
            continue;
        }
        if (candidate.value - last.value).abs() < criteria.min_swing {
            continue;
        }
        accepted.push(candidate);
    }

    accepted
        .windows(2)
        .map(|pair| (pair[0].value - pair[1].value).abs())
        .filter(|amp| *amp >= criteria.min_amplitude)
        .map(|amp| match criteria.cap {
            Some(cap) => amp.min(cap),
            None => amp,
        })
        .collect()
}

fn raw_axes(samples: &[ProcessedSample]) -> (Vec<f64>, Vec<f64>) {
    samples.iter().map(|s| (s.sx_mm_raw, s.sy_mm_raw)).unzip()
}

/// Amplitude events per second on both axes, scaled by the correction factor
pub fn oscillation_frequency(
    samples: &[ProcessedSample],
    duration_sec: f64,
    config: &MetricsConfig,
) -> f64 {
    if samples.len() < 3 || duration_sec <= 0.0 {
        return 0.0;
    }

    let (xs, ys) = raw_axes(samples);
    let criteria = config.frequency_criteria();
    let count = extract_amplitudes(&xs, &criteria).len() + extract_amplitudes(&ys, &criteria).len();
    if count == 0 {
        return 0.0;
    }
    count as f64 / duration_sec * config.frequency_correction_factor
}

/// Σ|A(n) − A(n+1)| over consecutive amplitudes
fn amplitude_irregularity(amplitudes: &[f64]) -> f64 {
    amplitudes.windows(2).map(|pair| (pair[0] - pair[1]).abs()).sum()
}

fn deltas(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// RMS of sample-to-sample changes
fn jitter_rms(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let d = deltas(values);
    (d.iter().map(|x| x * x).sum::<f64>() / d.len() as f64).sqrt()
}

/// 1 − |Pearson correlation| of the per-axis deltas
pub fn axis_discordance(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() < 3 || ys.len() < 3 {
        return 0.0;
    }
    let dx = deltas(xs);
    let dy = deltas(ys);
    let n = dx.len().min(dy.len());
    let mean_x = dx[..n].iter().sum::<f64>() / n as f64;
    let mean_y = dy[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in dx[..n].iter().zip(&dy[..n]) {
        let a = a - mean_x;
        let b = b - mean_y;
        cov += a * b;
        var_x += a * a;
        var_y += b * b;
    }

    if var_x < DISCORDANCE_MIN_VARIANCE || var_y < DISCORDANCE_MIN_VARIANCE {
        return 0.0;
    }
    let correlation = cov / (var_x.sqrt() * var_y.sqrt());
    1.0 - correlation.abs().clamp(0.0, 1.0)
}

/// Motion magnitude weighted by how erratic the motion is
pub fn coordination_factor(samples: &[ProcessedSample], config: &MetricsConfig) -> f64 {
    if samples.len() < config.coordination_min_samples {
        return 0.0;
    }

    let (xs, ys) = raw_axes(samples);
    let criteria = config.coordination_criteria();
    let amps_x = extract_amplitudes(&xs, &criteria);
    let amps_y = extract_amplitudes(&ys, &criteria);

    let sum: f64 = amps_x.iter().chain(&amps_y).sum();
    if sum < config.small_motion_floor_mm {
        return config.coordination_baseline;
    }

    let irregularity = amplitude_irregularity(&amps_x) + amplitude_irregularity(&amps_y);
    let jitter = jitter_rms(&xs) + jitter_rms(&ys);
    let discordance = axis_discordance(&xs, &ys);

    let chaos = (config.irregularity_weight * irregularity / (sum + 1.0)
        + config.jitter_weight * JITTER_SCALE * jitter / (sum + 1.0)
        + config.discordance_weight * discordance)
        .clamp(0.0, 1.0);

    sum * (COORDINATION_BASE_MULTIPLIER + chaos) * config.coordination_scaling_coefficient
}

/// All three metrics for a trace of the given duration
pub fn build_metrics(
    samples: &[ProcessedSample],
    duration_sec: f64,
    config: &MetricsConfig,
) -> MeasurementMetrics {
    if samples.is_empty() {
        return MeasurementMetrics::default();
    }
    MeasurementMetrics {
        stability: stability(samples),
        oscillation_frequency: oscillation_frequency(samples, duration_sec, config),
        coordination_factor: coordination_factor(samples, config),
    }
}
