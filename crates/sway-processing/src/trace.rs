//! Trial observability through an injected sink

use parking_lot::Mutex;
use std::sync::Arc;
use sway_core::MeasurementMetrics;

/// Notable events in the life of a trial
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    TrialStarted { duration_sec: f64 },
    CalibrationComplete { timestamp_sec: f64 },
    SampleProcessed { index: usize, t: f64 },
    TransportGap { gap_ms: f64 },
    Artifact { t: f64, sx_mm_raw: f64, sy_mm_raw: f64 },
    TrialFinished {
        duration_sec: f64,
        samples: usize,
        metrics: MeasurementMetrics,
        is_valid: bool,
    },
}

/// Receives trace events from the measurement controller
pub trait TraceSink: Send {
    fn record(&mut self, event: TraceEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Forwards events to `tracing`, logging only every n-th processed sample
#[derive(Debug)]
pub struct TracingSink {
    sample_log_interval: usize,
    samples_seen: usize,
}

impl TracingSink {
    pub fn new(sample_log_interval: usize) -> Self {
        Self {
            sample_log_interval: sample_log_interval.max(1),
            samples_seen: 0,
        }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        // Once per second at 50 Hz
        Self::new(50)
    }
}

impl TraceSink for TracingSink {
    fn record(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::TrialStarted { duration_sec } => {
                self.samples_seen = 0;
                tracing::info!(duration_sec, "Trial started");
            }
            TraceEvent::CalibrationComplete { timestamp_sec } => {
                tracing::info!(timestamp_sec, "Calibration complete");
            }
            TraceEvent::SampleProcessed { index, t } => {
                self.samples_seen += 1;
                if self.samples_seen % self.sample_log_interval == 0 {
                    tracing::debug!(index, t, "Processed sample");
                }
            }
            TraceEvent::TransportGap { gap_ms } => {
                tracing::warn!(gap_ms, "Transport gap");
            }
            TraceEvent::Artifact { t, sx_mm_raw, sy_mm_raw } => {
                tracing::warn!(t, sx_mm_raw, sy_mm_raw, "Displacement artifact");
            }
            TraceEvent::TrialFinished { duration_sec, samples, metrics, is_valid } => {
                tracing::info!(
                    duration_sec,
                    samples,
                    stability = metrics.stability,
                    frequency = metrics.oscillation_frequency,
                    coordination = metrics.coordination_factor,
                    is_valid,
                    "Trial finished"
                );
            }
        }
    }
}

/// Keeps every event; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&TraceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }
}

impl TraceSink for RecordingSink {
    fn record(&mut self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}
