//! Measurement service: one task owning the trial controller

use crate::autostart::{AutostartConfig, AutostartTrigger};
use crate::store::{MeasurementRecord, MeasurementStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sway_core::{
    MeasurementResult, MeasurementState, MeasurementStatus, RawSample, SwayError, SwayResult,
};
use sway_processing::{MeasurementConfig, MeasurementController};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// Commands accepted by the service task
#[derive(Debug)]
pub enum MeasurementCommand {
    /// Start a trial; `None` uses the configured default duration
    Start {
        duration_sec: Option<f64>,
        reply: oneshot::Sender<SwayResult<()>>,
    },
    Stop {
        reset_to_idle: bool,
        reply: oneshot::Sender<Option<MeasurementResult>>,
    },
    ArmAutostart,
    DisarmAutostart,
    Shutdown,
}

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementServiceConfig {
    pub measurement: MeasurementConfig,
    pub autostart: AutostartConfig,
}

/// Measurement service
pub struct MeasurementService {
    controller: MeasurementController,
    autostart: AutostartTrigger,
    store: Option<Arc<dyn MeasurementStore>>,

    // Communication channels
    sample_receiver: broadcast::Receiver<RawSample>,
    command_receiver: mpsc::Receiver<MeasurementCommand>,
    command_sender: mpsc::Sender<MeasurementCommand>,
    state_sender: watch::Sender<MeasurementState>,
}

impl MeasurementService {
    /// Create new measurement service
    pub fn new(
        sample_receiver: broadcast::Receiver<RawSample>,
        config: MeasurementServiceConfig,
        store: Option<Arc<dyn MeasurementStore>>,
    ) -> SwayResult<Self> {
        let controller = MeasurementController::new(config.measurement)?;
        let autostart = AutostartTrigger::new(config.autostart)?;
        let (command_sender, command_receiver) = mpsc::channel(32);
        let (state_sender, _) = watch::channel(controller.state().clone());

        Ok(MeasurementService {
            controller,
            autostart,
            store,
            sample_receiver,
            command_receiver,
            command_sender,
            state_sender,
        })
    }

    /// Handle for commands and state observation
    pub fn handle(&self) -> MeasurementHandle {
        MeasurementHandle {
            commands: self.command_sender.clone(),
            state: self.state_sender.subscribe(),
        }
    }

    /// Main service loop. Returns on shutdown, when the sample source closes,
    /// or once every handle is dropped.
    pub async fn run(self) {
        let MeasurementService {
            controller,
            autostart,
            store,
            mut sample_receiver,
            mut command_receiver,
            command_sender,
            state_sender,
        } = self;
        drop(command_sender);

        let mut worker = ServiceWorker {
            controller,
            autostart,
            store,
            persisted: false,
            state_sender,
        };

        tracing::info!(config = %worker.controller.config().name, "Measurement service started");

        loop {
            tokio::select! {
                biased;

                command = command_receiver.recv() => {
                    match command {
                        Some(MeasurementCommand::Shutdown) | None => {
                            tracing::info!("Measurement service shutting down");
                            break;
                        }
                        Some(command) => worker.handle_command(command),
                    }
                }

                sample = sample_receiver.recv() => {
                    match sample {
                        Ok(sample) => worker.on_sample(&sample),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Measurement service lagged behind the sensor");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Sample channel closed, stopping measurement service");
                            break;
                        }
                    }
                }
            }
        }

        if worker.controller.status().is_active() {
            worker.stop(false);
        }
    }
}

/// State owned by the running loop
struct ServiceWorker {
    controller: MeasurementController,
    autostart: AutostartTrigger,
    store: Option<Arc<dyn MeasurementStore>>,
    persisted: bool,
    state_sender: watch::Sender<MeasurementState>,
}

impl ServiceWorker {
    /// Replies go out after the new snapshot is visible
    fn handle_command(&mut self, command: MeasurementCommand) {
        match command {
            MeasurementCommand::Start { duration_sec, reply } => {
                let outcome = self.start(duration_sec);
                self.publish();
                let _ = reply.send(outcome);
            }
            MeasurementCommand::Stop { reset_to_idle, reply } => {
                let result = self.stop(reset_to_idle);
                let _ = reply.send(result);
            }
            MeasurementCommand::ArmAutostart => self.autostart.arm(),
            MeasurementCommand::DisarmAutostart => self.autostart.disarm(),
            MeasurementCommand::Shutdown => {}
        }
    }

    fn publish(&self) {
        self.state_sender.send_replace(self.controller.state().clone());
    }

    fn start(&mut self, duration_sec: Option<f64>) -> SwayResult<()> {
        match duration_sec {
            Some(duration) => self.controller.start(duration)?,
            None => self.controller.start_default()?,
        }
        self.persisted = false;
        self.autostart.disarm();
        Ok(())
    }

    fn stop(&mut self, reset_to_idle: bool) -> Option<MeasurementResult> {
        let result = self.controller.stop(false);
        self.persist();
        if reset_to_idle {
            self.controller.stop(true);
        }
        self.publish();
        result
    }

    fn on_sample(&mut self, sample: &RawSample) {
        let status = self.controller.status();
        if self.autostart.is_armed() && !status.is_active() && self.autostart.observe(sample) {
            let duration = self.autostart.config().trial_duration_sec;
            if let Err(e) = self.start(duration) {
                tracing::error!(error = %e, "Autostart could not start a trial");
            }
        }

        if !self.controller.status().is_active() {
            return;
        }
        self.controller.on_sample(sample);
        if self.controller.status() == MeasurementStatus::Finished {
            self.persist();
        }
        self.publish();
    }

    /// Save the finished trial once
    fn persist(&mut self) {
        if self.persisted {
            return;
        }
        let Some(store) = self.store.as_deref() else {
            return;
        };
        let Some(record) = MeasurementRecord::from_state(self.controller.state()) else {
            return;
        };

        self.persisted = true;
        match store.save(&record) {
            Ok(id) => tracing::info!(%id, is_valid = record.is_valid, "Measurement saved"),
            Err(e) => tracing::error!(error = %e, "Failed to save measurement"),
        }
    }
}

/// Cloneable handle to a running [`MeasurementService`]
#[derive(Debug, Clone)]
pub struct MeasurementHandle {
    commands: mpsc::Sender<MeasurementCommand>,
    state: watch::Receiver<MeasurementState>,
}

impl MeasurementHandle {
    async fn send(&self, command: MeasurementCommand) -> SwayResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SwayError::ChannelClosed { channel: "measurement commands" })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> MeasurementCommand,
    ) -> SwayResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(make(reply)).await?;
        response
            .await
            .map_err(|_| SwayError::ChannelClosed { channel: "measurement reply" })
    }

    /// Start a trial of the given length
    pub async fn start(&self, duration_sec: f64) -> SwayResult<()> {
        self.request(|reply| MeasurementCommand::Start {
            duration_sec: Some(duration_sec),
            reply,
        })
        .await?
    }

    /// Start a trial of the configured default length
    pub async fn start_default(&self) -> SwayResult<()> {
        self.request(|reply| MeasurementCommand::Start { duration_sec: None, reply })
            .await?
    }

    /// Finalize the current trial
    pub async fn stop(&self, reset_to_idle: bool) -> SwayResult<Option<MeasurementResult>> {
        self.request(|reply| MeasurementCommand::Stop { reset_to_idle, reply })
            .await
    }

    pub async fn arm_autostart(&self) -> SwayResult<()> {
        self.send(MeasurementCommand::ArmAutostart).await
    }

    pub async fn disarm_autostart(&self) -> SwayResult<()> {
        self.send(MeasurementCommand::DisarmAutostart).await
    }

    pub async fn shutdown(&self) -> SwayResult<()> {
        self.send(MeasurementCommand::Shutdown).await
    }

    /// Receiver of state snapshots, starting from the latest one
    pub fn subscribe(&self) -> watch::Receiver<MeasurementState> {
        self.state.clone()
    }

    /// Latest published snapshot
    pub fn state(&self) -> MeasurementState {
        self.state.borrow().clone()
    }

    /// Give the autostart `wait` to begin a trial, then start one manually.
    ///
    /// Returns true when the autostart had already started it.
    pub async fn start_unless_autostarted(&self, wait: Duration, duration_sec: f64) -> SwayResult<bool> {
        let mut receiver = self.state.clone();
        let left_idle = timeout(wait, receiver.wait_for(|state| state.status != MeasurementStatus::Idle)).await;
        match left_idle {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(_)) => Err(SwayError::ChannelClosed { channel: "measurement state" }),
            Err(_) => {
                tracing::warn!("Autostart did not fire, starting the trial manually");
                self.start(duration_sec).await?;
                Ok(false)
            }
        }
    }

    /// Wait until the published status equals `status`
    pub async fn wait_for_status(&self, status: MeasurementStatus) -> SwayResult<MeasurementState> {
        let mut receiver = self.state.clone();
        let state = receiver
            .wait_for(|state| state.status == status)
            .await
            .map_err(|_| SwayError::ChannelClosed { channel: "measurement state" })?;
        Ok(state.clone())
    }
}

/// Helper function to start the measurement service in the background
pub fn start_measurement_service(
    sample_receiver: broadcast::Receiver<RawSample>,
    config: MeasurementServiceConfig,
    store: Option<Arc<dyn MeasurementStore>>,
) -> SwayResult<(MeasurementHandle, JoinHandle<()>)> {
    let service = MeasurementService::new(sample_receiver, config, store)?;
    let handle = service.handle();
    let task = tokio::spawn(service.run());
    Ok((handle, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use sway_simulation::{NoiseConfig, SimulatorConfig, SwayPattern, SwaySimulator};

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        samples: broadcast::Sender<RawSample>,
        handle: MeasurementHandle,
        task: JoinHandle<()>,
        store: Arc<InMemoryStore>,
    }

    fn harness(config: MeasurementServiceConfig) -> Harness {
        let (samples, receiver) = broadcast::channel(1024);
        let store = Arc::new(InMemoryStore::new());
        let shared: Arc<dyn MeasurementStore> = store.clone();
        let (handle, task) = start_measurement_service(receiver, config, Some(shared)).unwrap();
        Harness { samples, handle, task, store }
    }

    fn rest(index: usize) -> RawSample {
        RawSample::new(index as f64 * 0.02, [0.01, -0.005, 1.0], [0.5, -0.3])
    }

    #[tokio::test]
    async fn test_trial_runs_and_persists_once() {
        let h = harness(MeasurementServiceConfig::default());
        h.handle.start(1.0).await.unwrap();

        for i in 0..100 {
            h.samples.send(rest(i)).unwrap();
        }

        let state = timeout(WAIT, h.handle.wait_for_status(MeasurementStatus::Finished))
            .await
            .unwrap()
            .unwrap();
        assert!(state.is_valid);
        assert_eq!(state.metrics.stability, 100.0);
        assert_eq!(h.store.len(), 1);

        let result = h.handle.stop(true).await.unwrap().unwrap();
        assert_eq!(result, state.result.unwrap());
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.handle.state().status, MeasurementStatus::Idle);

        let stored = h.store.list().unwrap();
        assert!(stored[0].record.is_valid);
        assert_eq!(stored[0].record.result.duration_sec, result.duration_sec);
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_latest_snapshot() {
        let h = harness(MeasurementServiceConfig::default());
        h.handle.start(0.5).await.unwrap();
        for i in 0..60 {
            h.samples.send(rest(i)).unwrap();
        }
        timeout(WAIT, h.handle.wait_for_status(MeasurementStatus::Finished))
            .await
            .unwrap()
            .unwrap();

        let late = h.handle.subscribe();
        let snapshot = late.borrow().clone();
        assert_eq!(snapshot.status, MeasurementStatus::Finished);
        assert!(snapshot.result.is_some());
    }

    #[tokio::test]
    async fn test_stop_mid_trial_persists_invalid_trial() {
        let h = harness(MeasurementServiceConfig::default());
        h.handle.start(10.0).await.unwrap();

        for i in 0..30 {
            h.samples.send(rest(i)).unwrap();
        }
        // 150 ms without samples
        for i in 37..50 {
            h.samples.send(rest(i)).unwrap();
        }
        timeout(WAIT, async {
            let mut receiver = h.handle.subscribe();
            receiver.wait_for(|s| s.sample_count() > 30).await.map(|_| ())
        })
        .await
        .unwrap()
        .unwrap();

        let result = h.handle.stop(false).await.unwrap().unwrap();
        assert!(result.duration_sec < 10.0);

        let state = h.handle.state();
        assert_eq!(state.status, MeasurementStatus::Finished);
        assert!(!state.is_valid);

        let stored = h.store.list().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].record.is_valid);
        assert!(stored[0].record.validation_message.as_deref().unwrap().contains("gap"));
    }

    #[tokio::test]
    async fn test_default_duration_trial() {
        let mut config = MeasurementServiceConfig::default();
        config.measurement.controller.default_duration_sec = 0.4;
        let h = harness(config);
        h.handle.start_default().await.unwrap();
        assert_eq!(h.handle.state().status, MeasurementStatus::Calibrating);

        for i in 0..60 {
            h.samples.send(rest(i)).unwrap();
        }
        let state = timeout(WAIT, h.handle.wait_for_status(MeasurementStatus::Finished))
            .await
            .unwrap()
            .unwrap();
        let duration = state.result.unwrap().duration_sec;
        assert!(duration >= 0.4 && duration < 0.45);
    }

    #[tokio::test]
    async fn test_invalid_duration_is_reported() {
        let h = harness(MeasurementServiceConfig::default());
        let err = h.handle.start(-1.0).await.unwrap_err();
        assert!(matches!(err, SwayError::InvalidDuration { .. }));
        assert_eq!(h.handle.state().status, MeasurementStatus::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let h = harness(MeasurementServiceConfig::default());
        assert!(h.handle.stop(true).await.unwrap().is_none());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_autostart_starts_trial() {
        let config = MeasurementServiceConfig {
            autostart: AutostartConfig {
                trial_duration_sec: Some(0.5),
                ..Default::default()
            },
            ..Default::default()
        };
        let h = harness(config);
        h.handle.arm_autostart().await.unwrap();

        for i in 0..20 {
            h.samples.send(rest(i)).unwrap();
        }
        // Lean by 2 degrees, about 8.6 mm
        for i in 20..100 {
            let mut sample = rest(i);
            sample.angle_x_deg += 2.0;
            h.samples.send(sample).unwrap();
        }

        let state = timeout(WAIT, h.handle.wait_for_status(MeasurementStatus::Finished))
            .await
            .unwrap()
            .unwrap();
        assert!(state.result.is_some());
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_disarmed_autostart_stays_idle() {
        let h = harness(MeasurementServiceConfig::default());
        h.handle.arm_autostart().await.unwrap();
        h.handle.disarm_autostart().await.unwrap();

        for i in 0..40 {
            let mut sample = rest(i);
            sample.angle_x_deg += if i > 20 { 5.0 } else { 0.0 };
            h.samples.send(sample).unwrap();
        }
        h.handle.shutdown().await.unwrap();
        timeout(WAIT, h.task).await.unwrap().unwrap();
        assert_eq!(h.handle.state().status, MeasurementStatus::Idle);
    }

    #[tokio::test]
    async fn test_manual_start_when_autostart_stays_quiet() {
        let h = harness(MeasurementServiceConfig::default());
        h.handle.arm_autostart().await.unwrap();
        for i in 0..20 {
            h.samples.send(rest(i)).unwrap();
        }

        let autostarted = h
            .handle
            .start_unless_autostarted(Duration::from_millis(50), 0.5)
            .await
            .unwrap();
        assert!(!autostarted);
        assert_eq!(h.handle.state().status, MeasurementStatus::Calibrating);

        for i in 20..80 {
            h.samples.send(rest(i)).unwrap();
        }
        let state = timeout(WAIT, h.handle.wait_for_status(MeasurementStatus::Finished))
            .await
            .unwrap()
            .unwrap();
        assert!(state.result.unwrap().duration_sec < 0.55);
    }

    #[tokio::test]
    async fn test_autostarted_trial_is_not_restarted() {
        let config = MeasurementServiceConfig {
            autostart: AutostartConfig {
                trial_duration_sec: Some(0.5),
                ..Default::default()
            },
            ..Default::default()
        };
        let h = harness(config);
        h.handle.arm_autostart().await.unwrap();
        for i in 0..20 {
            h.samples.send(rest(i)).unwrap();
        }
        let mut sample = rest(20);
        sample.angle_x_deg += 2.0;
        h.samples.send(sample).unwrap();

        let autostarted = h.handle.start_unless_autostarted(WAIT, 0.5).await.unwrap();
        assert!(autostarted);
        assert_ne!(h.handle.state().status, MeasurementStatus::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_finalizes_active_trial() {
        let h = harness(MeasurementServiceConfig::default());
        h.handle.start(10.0).await.unwrap();
        for i in 0..40 {
            h.samples.send(rest(i)).unwrap();
        }
        timeout(WAIT, async {
            let mut receiver = h.handle.subscribe();
            receiver.wait_for(|s| s.sample_count() > 0).await.map(|_| ())
        })
        .await
        .unwrap()
        .unwrap();

        h.handle.shutdown().await.unwrap();
        timeout(WAIT, h.task).await.unwrap().unwrap();

        assert_eq!(h.handle.state().status, MeasurementStatus::Finished);
        assert_eq!(h.store.len(), 1);
        assert!(h.handle.start(1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_simulated_sway_trial() {
        let config = MeasurementServiceConfig {
            measurement: MeasurementConfig::angle_tracking(),
            ..Default::default()
        };
        let h = harness(config);
        let mut simulator = SwaySimulator::new(SimulatorConfig {
            pattern: SwayPattern::Sinusoidal {
                frequency_hz: 0.5,
                amplitude_x_mm: 6.0,
                amplitude_y_mm: 4.0,
            },
            noise: NoiseConfig::none(),
            seed: Some(11),
            ..Default::default()
        })
        .unwrap();

        h.handle.start(5.0).await.unwrap();
        for sample in simulator.generate(6.0) {
            h.samples.send(sample).unwrap();
        }

        let state = timeout(WAIT, h.handle.wait_for_status(MeasurementStatus::Finished))
            .await
            .unwrap()
            .unwrap();
        assert!(state.is_valid, "{:?}", state.validation_message);
        assert!(state.metrics.stability < 100.0);
        assert!(state.metrics.oscillation_frequency > 0.0);

        let spectrum = state.result.unwrap().spectrum.unwrap();
        assert!((spectrum.x.peak_frequency_hz - 0.5).abs() < 0.2);
    }

    #[tokio::test]
    async fn test_closed_sample_source_stops_service() {
        let h = harness(MeasurementServiceConfig::default());
        drop(h.samples);
        timeout(WAIT, h.task).await.unwrap().unwrap();
        assert!(matches!(
            h.handle.arm_autostart().await,
            Err(SwayError::ChannelClosed { .. })
        ));
    }
}
