//! Measurement controller: the state machine around one timed trial
//!
//! `Idle --start--> Calibrating --first processed sample--> Running
//! --(t >= duration)--> Finished --stop(reset)--> Idle`. Stopping from any
//! non-idle state finalizes immediately.
//!
//! Transport gaps and displacement artifacts never abort a trial. They mark
//! it invalid and leave a message on the published state.

use crate::config::MeasurementConfig;
use crate::metrics::build_metrics;
use crate::processor::SampleProcessor;
use crate::spectrum::analyze_spectrum;
use crate::trace::{TraceEvent, TraceSink, TracingSink};
use sway_core::{
    MeasurementMetrics, MeasurementResult, MeasurementState, MeasurementStatus, RawSample,
    SwayError, SwayResult,
};

pub struct MeasurementController {
    config: MeasurementConfig,
    processor: SampleProcessor,
    state: MeasurementState,
    target_duration_sec: f64,
    last_timestamp: Option<f64>,
    sink: Box<dyn TraceSink>,
}

impl MeasurementController {
    /// Controller logging through `tracing`
    pub fn new(config: MeasurementConfig) -> SwayResult<Self> {
        Self::with_sink(config, Box::new(TracingSink::default()))
    }

    pub fn with_sink(config: MeasurementConfig, sink: Box<dyn TraceSink>) -> SwayResult<Self> {
        config.validate()?;
        Ok(MeasurementController {
            processor: SampleProcessor::new(config.motion.clone()),
            target_duration_sec: config.controller.default_duration_sec,
            config,
            state: MeasurementState::default(),
            last_timestamp: None,
            sink,
        })
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Latest published snapshot
    pub fn state(&self) -> &MeasurementState {
        &self.state
    }

    pub fn status(&self) -> MeasurementStatus {
        self.state.status
    }

    /// Begin a new trial, discarding any previous one
    pub fn start(&mut self, duration_sec: f64) -> SwayResult<()> {
        if !duration_sec.is_finite() || duration_sec <= 0.0 {
            return Err(SwayError::InvalidDuration { duration_sec });
        }

        self.processor.reset();
        self.target_duration_sec = duration_sec;
        self.last_timestamp = None;
        self.state = MeasurementState::started();
        self.sink.record(TraceEvent::TrialStarted { duration_sec });
        Ok(())
    }

    /// Begin a trial of the configured default length
    pub fn start_default(&mut self) -> SwayResult<()> {
        self.start(self.config.controller.default_duration_sec)
    }

    /// Feed one sensor sample; ignored unless a trial is active
    pub fn on_sample(&mut self, raw: &RawSample) {
        if !self.state.status.is_active() {
            return;
        }

        let gap_ms = self.check_gap(raw.timestamp_sec);

        let was_calibrated = self.processor.is_calibrated();
        let Some(sample) = self.processor.process(raw) else {
            if !was_calibrated && self.processor.is_calibrated() {
                self.sink.record(TraceEvent::CalibrationComplete {
                    timestamp_sec: raw.timestamp_sec,
                });
            }
            if let Some(ms) = gap_ms {
                self.state.validation_message = Some(gap_message(ms));
            }
            return;
        };

        let limit = self.config.motion.position_limit_mm;
        if sample.has_artifact {
            self.state.is_valid = false;
            self.state.validation_message =
                Some(format!("Artifact: displacement exceeds ±{} mm", limit));
            self.sink.record(TraceEvent::Artifact {
                t: sample.t,
                sx_mm_raw: sample.sx_mm_raw,
                sy_mm_raw: sample.sy_mm_raw,
            });
        } else if let Some(ms) = gap_ms {
            self.state.validation_message = Some(gap_message(ms));
        }

        self.state.processed_samples.push(sample);
        self.sink.record(TraceEvent::SampleProcessed {
            index: self.state.processed_samples.len() - 1,
            t: sample.t,
        });

        let duration = sample.t.max(self.config.controller.duration_epsilon_sec);
        let metrics = build_metrics(&self.state.processed_samples, duration, &self.config.metrics);

        self.state.status = MeasurementStatus::Running;
        self.state.elapsed_sec = sample.t;
        self.state.metrics = metrics;

        if sample.t >= self.target_duration_sec {
            self.finalize(Some(metrics));
        }
    }

    /// Finalize the trial and return its result.
    ///
    /// With `reset_to_idle` the controller then returns to the default idle
    /// snapshot. Calling this on a finished trial returns the cached result.
    pub fn stop(&mut self, reset_to_idle: bool) -> Option<MeasurementResult> {
        if self.state.status == MeasurementStatus::Idle {
            return None;
        }

        let result = self.finalize(None);
        if reset_to_idle {
            self.state = MeasurementState::default();
        }
        result
    }

    /// Record a transport gap against the previous sample, returning its length in ms
    fn check_gap(&mut self, timestamp_sec: f64) -> Option<f64> {
        let previous = self.last_timestamp.replace(timestamp_sec)?;
        let gap = timestamp_sec - previous;
        if gap <= self.config.controller.max_gap_sec {
            return None;
        }

        let gap_ms = gap * 1000.0;
        self.state.is_valid = false;
        self.sink.record(TraceEvent::TransportGap { gap_ms });
        Some(gap_ms)
    }

    fn finalize(&mut self, precomputed: Option<MeasurementMetrics>) -> Option<MeasurementResult> {
        if self.state.status == MeasurementStatus::Finished {
            return self.state.result.clone();
        }

        let Some(last) = self.state.processed_samples.last() else {
            self.state = MeasurementState::default();
            return None;
        };
        let duration = last.t;

        let metrics = precomputed.unwrap_or_else(|| {
            build_metrics(
                &self.state.processed_samples,
                duration.max(self.config.controller.duration_epsilon_sec),
                &self.config.metrics,
            )
        });

        let result = MeasurementResult {
            metrics,
            duration_sec: duration,
            samples: self.state.processed_samples.clone(),
            spectrum: analyze_spectrum(&self.state.processed_samples),
        };

        self.state.status = MeasurementStatus::Finished;
        self.state.elapsed_sec = duration;
        self.state.metrics = metrics;
        self.state.result = Some(result.clone());

        self.sink.record(TraceEvent::TrialFinished {
            duration_sec: duration,
            samples: result.samples.len(),
            metrics,
            is_valid: self.state.is_valid,
        });
        Some(result)
    }
}

fn gap_message(gap_ms: f64) -> String {
    format!("Transport gap: {:.0} ms without samples", gap_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{NullSink, RecordingSink};

    const DT: f64 = 0.02;

    fn controller(config: MeasurementConfig) -> MeasurementController {
        MeasurementController::with_sink(config, Box::new(NullSink)).unwrap()
    }

    fn rest_trial(controller: &mut MeasurementController, seconds: f64) {
        let bias = RawSample::new(0.0, [0.015, -0.008, 0.998], [0.7, -1.2]);
        let n = (seconds / DT) as usize + 20;
        for i in 0..n {
            controller.on_sample(&bias.with_timestamp(i as f64 * DT));
        }
    }

    #[test]
    fn test_rest_trial() {
        let mut controller = controller(MeasurementConfig::reference_device());
        controller.start(10.0).unwrap();
        assert_eq!(controller.status(), MeasurementStatus::Calibrating);

        rest_trial(&mut controller, 10.0);

        let state = controller.state();
        assert_eq!(state.status, MeasurementStatus::Finished);
        assert!(state.is_valid);
        assert!(state.validation_message.is_none());

        let result = state.result.as_ref().unwrap();
        assert_eq!(result.metrics.stability, 100.0);
        assert_eq!(result.metrics.oscillation_frequency, 0.0);
        assert_eq!(result.metrics.coordination_factor, 10.0);
        assert!(result.duration_sec >= 10.0);
        assert_eq!(result.samples.len(), state.processed_samples.len());
    }

    #[test]
    fn test_status_progression() {
        let mut controller = controller(MeasurementConfig::reference_device());
        controller.on_sample(&RawSample::at_rest(0.0));
        assert_eq!(controller.status(), MeasurementStatus::Idle);

        controller.start(1.0).unwrap();
        for i in 0..10 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
            assert_eq!(controller.status(), MeasurementStatus::Calibrating);
            assert!(controller.state().processed_samples.is_empty());
        }

        controller.on_sample(&RawSample::at_rest(0.2));
        assert_eq!(controller.status(), MeasurementStatus::Running);
        assert_eq!(controller.state().processed_samples[0].t, 0.0);

        for i in 11..70 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }
        assert_eq!(controller.status(), MeasurementStatus::Finished);

        // Finished trials ignore further samples
        let count = controller.state().processed_samples.len();
        controller.on_sample(&RawSample::at_rest(5.0));
        assert_eq!(controller.state().processed_samples.len(), count);
    }

    #[test]
    fn test_invalid_duration() {
        let mut controller = controller(MeasurementConfig::reference_device());
        for duration in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                controller.start(duration),
                Err(SwayError::InvalidDuration { .. })
            ));
        }
        assert_eq!(controller.status(), MeasurementStatus::Idle);
    }

    #[test]
    fn test_artifact_invalidates_trial() {
        let mut config = MeasurementConfig::angle_tracking();
        config.motion.angle_highpass_cutoff_hz = 0.05;
        let mut controller = controller(config);
        controller.start(5.0).unwrap();

        for i in 0..12 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }
        controller.on_sample(&RawSample::new(12.0 * DT, [0.0, 0.0, 1.0], [11.0, 0.0]));

        let state = controller.state();
        let last = state.processed_samples.last().unwrap();
        assert!(last.has_artifact);
        assert!(last.sx_mm_raw > 45.0);
        assert_eq!(last.sx_mm, 40.0);
        assert!(!state.is_valid);
        assert!(state.validation_message.as_deref().unwrap().contains("Artifact"));
    }

    #[test]
    fn test_transport_gap_invalidates_trial() {
        let mut controller = controller(MeasurementConfig::reference_device());
        controller.start(5.0).unwrap();
        for i in 0..20 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }
        let before = controller.state().processed_samples.last().unwrap().t;

        let gapped = 19.0 * DT + 0.15;
        controller.on_sample(&RawSample::at_rest(gapped));

        let state = controller.state();
        assert!(!state.is_valid);
        let message = state.validation_message.as_deref().unwrap();
        assert!(message.contains("Transport gap"));
        assert!(message.contains("150"));

        let t = state.processed_samples.last().unwrap().t;
        assert!((t - before - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_artifact_message_wins_over_gap() {
        let mut config = MeasurementConfig::angle_tracking();
        config.motion.angle_highpass_cutoff_hz = 0.05;
        let mut controller = controller(config);
        controller.start(5.0).unwrap();
        for i in 0..12 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }
        controller.on_sample(&RawSample::new(11.0 * DT + 0.2, [0.0, 0.0, 1.0], [11.0, 0.0]));

        let message = controller.state().validation_message.clone().unwrap();
        assert!(message.starts_with("Artifact"));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut controller = controller(MeasurementConfig::reference_device());
        controller.start(10.0).unwrap();
        for i in 0..60 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }

        let first = controller.stop(false).unwrap();
        assert_eq!(controller.status(), MeasurementStatus::Finished);
        let second = controller.stop(false).unwrap();
        assert_eq!(first, second);

        let third = controller.stop(true).unwrap();
        assert_eq!(first, third);
        assert_eq!(controller.state(), &MeasurementState::default());
        assert!(controller.stop(true).is_none());
    }

    #[test]
    fn test_stop_empty_trial_returns_to_idle() {
        let mut controller = controller(MeasurementConfig::reference_device());
        controller.start(10.0).unwrap();
        controller.on_sample(&RawSample::at_rest(0.0));

        assert!(controller.stop(false).is_none());
        assert_eq!(controller.status(), MeasurementStatus::Idle);
    }

    #[test]
    fn test_restart_clears_previous_trial() {
        let mut controller = controller(MeasurementConfig::reference_device());
        controller.start(10.0).unwrap();
        for i in 0..30 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }
        controller.on_sample(&RawSample::at_rest(1.0));
        assert!(!controller.state().is_valid);

        controller.start(10.0).unwrap();
        let state = controller.state();
        assert!(state.is_valid);
        assert!(state.processed_samples.is_empty());
        assert_eq!(state.status, MeasurementStatus::Calibrating);
    }

    #[test]
    fn test_trace_events() {
        let sink = RecordingSink::new();
        let mut controller = MeasurementController::with_sink(
            MeasurementConfig::reference_device(),
            Box::new(sink.clone()),
        )
        .unwrap();

        controller.start(0.5).unwrap();
        for i in 0..50 {
            controller.on_sample(&RawSample::at_rest(i as f64 * DT));
        }

        let events = sink.events();
        assert_eq!(events[0], TraceEvent::TrialStarted { duration_sec: 0.5 });
        assert_eq!(
            sink.count(|e| matches!(e, TraceEvent::CalibrationComplete { .. })),
            1
        );
        assert_eq!(
            sink.count(|e| matches!(e, TraceEvent::TrialFinished { is_valid: true, .. })),
            1
        );
        assert_eq!(controller.status(), MeasurementStatus::Finished);
        assert_eq!(
            sink.count(|e| matches!(e, TraceEvent::SampleProcessed { .. })),
            controller.state().processed_samples.len()
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = MeasurementConfig::reference_device();
        config.motion.position_limit_mm = 0.0;
        assert!(MeasurementController::new(config).is_err());
    }
}
