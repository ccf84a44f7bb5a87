//! Sway demo: simulated sensor → measurement service → printed result

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use sway_core::{MeasurementMetrics, MeasurementStatus, SwaySpectrum};
use sway_service::{
    start_measurement_service, AutostartConfig, InMemoryStore, MeasurementServiceConfig,
    MeasurementStore,
};
use sway_simulation::{start_sample_stream, SimulatorConfig, StreamCommand, StreamConfig, SwayPattern};

const PLAYBACK_SPEED: f64 = 5.0;
const AUTOSTART_WAIT: Duration = Duration::from_secs(2);
const FINISH_MARGIN: Duration = Duration::from_secs(5);

/// What the demo prints; the full trace is left out
#[derive(Serialize)]
struct TrialSummary {
    is_valid: bool,
    validation_message: Option<String>,
    duration_sec: f64,
    samples: usize,
    metrics: MeasurementMetrics,
    spectrum: Option<SwaySpectrum>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let duration_sec = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<f64>()
            .with_context(|| format!("Invalid trial duration: {}", arg))?,
        None => 10.0,
    };
    if !duration_sec.is_finite() || duration_sec <= 0.0 {
        anyhow::bail!("Trial duration must be positive, got {}", duration_sec);
    }

    println!("Starting sway demo ({} s trial)...", duration_sec);
    println!("Signal Flow: Sensor Simulator → Measurement Service → Balance Metrics");

    let (samples, stream_control) = start_sample_stream(StreamConfig {
        simulator: SimulatorConfig::default(),
        playback_speed: PLAYBACK_SPEED,
        ..Default::default()
    })?;

    let store = Arc::new(InMemoryStore::new());
    let shared: Arc<dyn MeasurementStore> = store.clone();
    let config = MeasurementServiceConfig {
        autostart: AutostartConfig {
            trial_duration_sec: Some(duration_sec),
            ..Default::default()
        },
        ..Default::default()
    };
    let (handle, service) = start_measurement_service(samples.subscribe(), config, Some(shared))?;

    // Stand still, then start swaying; the autostart picks it up
    handle.arm_autostart().await?;
    stream_control.send(StreamCommand::Start).await?;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let (_, gentle_sway) = SwayPattern::presets()
        .into_iter()
        .find(|(name, _)| *name == "Gentle Sway")
        .context("Gentle Sway preset missing")?;
    stream_control.send(StreamCommand::UpdatePattern(gentle_sway)).await?;

    let autostarted = handle.start_unless_autostarted(AUTOSTART_WAIT, duration_sec).await?;
    tracing::info!(autostarted, "Trial running");

    let trial_budget = Duration::try_from_secs_f64(duration_sec / PLAYBACK_SPEED)
        .context("Trial duration too long")?
        + FINISH_MARGIN;
    let state = timeout(trial_budget, handle.wait_for_status(MeasurementStatus::Finished))
        .await
        .context("Trial did not finish in time")??;
    let result = state.result.clone().context("Finished trial without a result")?;

    let summary = TrialSummary {
        is_valid: state.is_valid,
        validation_message: state.validation_message.clone(),
        duration_sec: result.duration_sec,
        samples: result.samples.len(),
        metrics: result.metrics,
        spectrum: result.spectrum,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    for stored in store.list()? {
        println!("Saved measurement {} at {}", stored.id, stored.saved_at);
    }

    stream_control.send(StreamCommand::Stop).await?;
    handle.shutdown().await?;
    service.await?;

    Ok(())
}
