//! Frequency summary of a finished displacement trace

use rustfft::{num_complex::Complex, FftPlanner};
use sway_core::{AxisSpectrum, ProcessedSample, SwaySpectrum};

/// Shorter traces carry too little frequency information to report
pub const MIN_SPECTRUM_SAMPLES: usize = 16;

/// Peak frequency, mean frequency and power of both raw axes
pub fn analyze_spectrum(samples: &[ProcessedSample]) -> Option<SwaySpectrum> {
    if samples.len() < MIN_SPECTRUM_SAMPLES {
        return None;
    }
    let duration = samples.last()?.t - samples[0].t;
    if !(duration > 0.0) {
        return None;
    }
    let sample_rate_hz = (samples.len() - 1) as f64 / duration;

    let mut planner = FftPlanner::new();
    let xs: Vec<f64> = samples.iter().map(|s| s.sx_mm_raw).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.sy_mm_raw).collect();

    Some(SwaySpectrum {
        x: axis_spectrum(&mut planner, &xs, sample_rate_hz),
        y: axis_spectrum(&mut planner, &ys, sample_rate_hz),
        sample_rate_hz,
    })
}

fn axis_spectrum(planner: &mut FftPlanner<f64>, data: &[f64], sample_rate_hz: f64) -> AxisSpectrum {
    let mean = data.iter().sum::<f64>() / data.len() as f64;

    // Zero-padded to the next power of two
    let fft_size = data.len().next_power_of_two();
    let fft = planner.plan_fft_forward(fft_size);
    let mut buffer: Vec<Complex<f64>> = data.iter().map(|&x| Complex::new(x - mean, 0.0)).collect();
    buffer.resize(fft_size, Complex::new(0.0, 0.0));
    fft.process(&mut buffer);

    let resolution = sample_rate_hz / fft_size as f64;
    // Positive frequencies without DC
    let power: Vec<(f64, f64)> = buffer[1..fft_size / 2]
        .iter()
        .enumerate()
        .map(|(i, c)| ((i + 1) as f64 * resolution, c.norm_sqr()))
        .collect();

    let total_power: f64 = power.iter().map(|(_, p)| p).sum();
    if total_power <= f64::EPSILON {
        return AxisSpectrum::default();
    }

    let peak_frequency_hz = power
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(f, _)| *f)
        .unwrap_or(0.0);
    let mean_frequency_hz = power.iter().map(|(f, p)| f * p).sum::<f64>() / total_power;

    AxisSpectrum {
        peak_frequency_hz,
        mean_frequency_hz,
        total_power,
    }
}
