//! Pre-defined platform sway patterns

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Planar platform motion at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SwayKinematics {
    pub x_mm: f64,
    pub y_mm: f64,
    pub ax_mm_s2: f64,
    pub ay_mm_s2: f64,
}

/// Predefined sway patterns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SwayPattern {
    /// Standing perfectly still
    Still,
    /// Elliptical sway: X follows a sine, Y the matching cosine
    Sinusoidal {
        frequency_hz: f64,
        amplitude_x_mm: f64,
        amplitude_y_mm: f64,
    },
    /// Sudden lean held from `at_sec` on
    Step {
        at_sec: f64,
        offset_x_mm: f64,
        offset_y_mm: f64,
    },
    /// Fast small oscillation on top of a slow drift
    Tremor {
        frequency_hz: f64,
        amplitude_mm: f64,
        drift_frequency_hz: f64,
        drift_mm: f64,
    },
}

impl SwayPattern {
    /// Position and acceleration at the given time
    pub fn kinematics_at(&self, time: f64) -> SwayKinematics {
        match *self {
            SwayPattern::Still => SwayKinematics::default(),

            SwayPattern::Sinusoidal { frequency_hz, amplitude_x_mm, amplitude_y_mm } => {
                let omega = 2.0 * PI * frequency_hz;
                let x = amplitude_x_mm * (omega * time).sin();
                let y = amplitude_y_mm * (omega * time).cos();
                SwayKinematics {
                    x_mm: x,
                    y_mm: y,
                    ax_mm_s2: -omega * omega * x,
                    ay_mm_s2: -omega * omega * y,
                }
            }

            SwayPattern::Step { at_sec, offset_x_mm, offset_y_mm } => {
                if time >= at_sec {
                    SwayKinematics {
                        x_mm: offset_x_mm,
                        y_mm: offset_y_mm,
                        ..Default::default()
                    }
                } else {
                    SwayKinematics::default()
                }
            }

            SwayPattern::Tremor { frequency_hz, amplitude_mm, drift_frequency_hz, drift_mm } => {
                let fast = 2.0 * PI * frequency_hz;
                let slow = 2.0 * PI * drift_frequency_hz;
                let tremor = amplitude_mm * (fast * time).sin();
                let drift = drift_mm * (slow * time).sin();
                let accel = -fast * fast * tremor - slow * slow * drift;
                SwayKinematics {
                    x_mm: tremor + drift,
                    y_mm: 0.5 * (tremor - drift),
                    ax_mm_s2: accel,
                    ay_mm_s2: 0.5 * (-fast * fast * tremor + slow * slow * drift),
                }
            }
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            SwayPattern::Still => "Standing still",
            SwayPattern::Sinusoidal { .. } => "Regular sway",
            SwayPattern::Step { .. } => "Sudden lean",
            SwayPattern::Tremor { .. } => "Tremor with drift",
        }
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, SwayPattern)> {
        vec![
            ("Still", SwayPattern::Still),
            ("Gentle Sway", SwayPattern::Sinusoidal {
                frequency_hz: 0.5, amplitude_x_mm: 6.0, amplitude_y_mm: 4.0
            }),
            ("Strong Sway", SwayPattern::Sinusoidal {
                frequency_hz: 1.0, amplitude_x_mm: 15.0, amplitude_y_mm: 10.0
            }),
            ("Fall", SwayPattern::Step {
                at_sec: 3.0, offset_x_mm: 50.0, offset_y_mm: 0.0
            }),
            ("Tremor", SwayPattern::Tremor {
                frequency_hz: 5.0, amplitude_mm: 1.5, drift_frequency_hz: 0.2, drift_mm: 8.0
            }),
        ]
    }
}

impl Default for SwayPattern {
    fn default() -> Self {
        SwayPattern::Still
    }
}
