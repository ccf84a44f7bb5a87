//! Real-time sample streaming in place of the wireless sensor

use crate::sway_patterns::SwayPattern;
use crate::sway_simulator::{SimulatorConfig, SwaySimulator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sway_core::{RawSample, SwayError, SwayResult};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Fastest supported wall-clock speed-up
pub const MAX_PLAYBACK_SPEED: f64 = 100.0;

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sensor simulation configuration
    pub simulator: SimulatorConfig,
    /// Samples kept for slow subscribers
    pub buffer_size: usize,
    /// Wall-clock speed-up; 1.0 streams at the simulated sample rate
    pub playback_speed: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            buffer_size: 256,
            playback_speed: 1.0,
        }
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    Stop,
    Pause,
    Resume,
    UpdatePattern(SwayPattern),
    /// Simulate lost packets: the next sample arrives this many seconds late
    InjectGap(f64),
}

/// Stream statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub samples_sent: u64,
    pub simulated_time_sec: f64,
    pub gaps_injected: u32,
}

/// Real-time sensor sample stream
pub struct RealTimeSampleStream {
    config: StreamConfig,
    simulator: SwaySimulator,
    data_sender: broadcast::Sender<RawSample>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: mpsc::Sender<StreamCommand>,
    stats: Arc<Mutex<StreamStats>>,
}

impl RealTimeSampleStream {
    /// Create new real-time sample stream
    pub fn new(config: StreamConfig) -> SwayResult<Self> {
        if !(config.playback_speed > 0.0 && config.playback_speed <= MAX_PLAYBACK_SPEED) {
            return Err(SwayError::Simulation {
                reason: format!(
                    "Playback speed {} must be in (0, {}]",
                    config.playback_speed, MAX_PLAYBACK_SPEED
                ),
            });
        }
        let simulator = SwaySimulator::new(config.simulator.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size.max(1));
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok(RealTimeSampleStream {
            config,
            simulator,
            data_sender,
            control_receiver,
            control_sender,
            stats: Arc::new(Mutex::new(StreamStats::default())),
        })
    }

    /// Get a receiver for sample updates
    pub fn subscribe(&self) -> broadcast::Receiver<RawSample> {
        self.data_sender.subscribe()
    }

    /// Sender that other consumers can subscribe through
    pub fn data_handle(&self) -> broadcast::Sender<RawSample> {
        self.data_sender.clone()
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<StreamCommand> {
        self.control_sender.clone()
    }

    /// Shared statistics, updated while the stream runs
    pub fn stats_handle(&self) -> Arc<Mutex<StreamStats>> {
        Arc::clone(&self.stats)
    }

    fn tick_interval(&self) -> Duration {
        let rate = self.config.simulator.sample_rate_hz * self.config.playback_speed;
        Duration::from_secs_f64(1.0 / rate)
    }

    /// Run the streaming loop until every control handle is dropped
    pub async fn run(self) {
        let tick = self.tick_interval();
        let RealTimeSampleStream {
            config,
            simulator,
            data_sender,
            mut control_receiver,
            control_sender,
            stats,
        } = self;
        // Only handles given out earlier keep the stream alive
        drop(control_sender);

        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            rate_hz = config.simulator.sample_rate_hz,
            pattern = config.simulator.pattern.description(),
            "Sample stream ready"
        );

        let mut worker = StreamWorker {
            simulator,
            data_sender,
            stats,
            running: false,
        };

        loop {
            tokio::select! {
                _ = ticker.tick(), if worker.running => {
                    worker.emit().await;
                }

                command = control_receiver.recv() => {
                    let Some(command) = command else {
                        tracing::info!("Sample stream control channel closed");
                        break;
                    };
                    worker.handle_command(command).await;
                }
            }
        }
    }
}

/// Mutable state of a running stream
struct StreamWorker {
    simulator: SwaySimulator,
    data_sender: broadcast::Sender<RawSample>,
    stats: Arc<Mutex<StreamStats>>,
    running: bool,
}

impl StreamWorker {
    async fn emit(&mut self) {
        let sample = self.simulator.next_sample();
        {
            let mut stats = self.stats.lock().await;
            stats.samples_sent += 1;
            stats.simulated_time_sec = sample.timestamp_sec;
        }
        // No subscribers is not an error
        let _ = self.data_sender.send(sample);
    }

    async fn handle_command(&mut self, command: StreamCommand) {
        match command {
            StreamCommand::Start => {
                self.running = true;
                tracing::info!("Sample stream started");
            }
            StreamCommand::Stop => {
                self.running = false;
                self.simulator.reset_time();
                *self.stats.lock().await = StreamStats::default();
                tracing::info!("Sample stream stopped");
            }
            StreamCommand::Pause => {
                self.running = false;
                tracing::info!("Sample stream paused");
            }
            StreamCommand::Resume => {
                self.running = true;
                tracing::info!("Sample stream resumed");
            }
            StreamCommand::UpdatePattern(pattern) => {
                self.simulator.update_pattern(pattern);
                tracing::info!(pattern = pattern.description(), "Sample stream pattern updated");
            }
            StreamCommand::InjectGap(gap_sec) => {
                self.simulator.inject_gap(gap_sec);
                self.stats.lock().await.gaps_injected += 1;
                tracing::info!(gap_sec, "Transport gap injected");
            }
        }
        self.stats.lock().await.is_running = self.running;
    }
}

/// Helper function to create and start a stream in the background.
///
/// Returns the sample sender (subscribe to it for samples) and the control
/// handle. The stream stops once every control handle is dropped.
pub fn start_sample_stream(
    config: StreamConfig,
) -> SwayResult<(broadcast::Sender<RawSample>, mpsc::Sender<StreamCommand>)> {
    let stream = RealTimeSampleStream::new(config)?;
    let data_sender = stream.data_handle();
    let control_sender = stream.control_handle();

    tokio::spawn(stream.run());

    Ok((data_sender, control_sender))
}
