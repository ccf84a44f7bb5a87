//! Sway-Processing: motion estimation and balance metrics
//!
//! Per-sample filtering and integration from raw inertial samples to a 2D
//! displacement trace, the metrics computed over that trace, and the
//! controller that bounds a timed trial.

pub mod filters;
pub mod pipeline;
pub mod estimator;
pub mod processor;
pub mod metrics;
pub mod spectrum;
pub mod controller;
pub mod trace;
pub mod config;

pub use filters::{SampleFilter, LowPassFilter, HighPassFilter, DeadZone};
pub use pipeline::{FilterChain, FilterChainBuilder, AccelerationConditioner};
pub use estimator::{MotionEstimator, MotionOutput, Baseline};
pub use processor::SampleProcessor;
pub use metrics::{AmplitudeCriteria, Extremum, ExtremumKind, build_metrics};
pub use spectrum::analyze_spectrum;
pub use controller::MeasurementController;
pub use trace::{TraceEvent, TraceSink, TracingSink, NullSink, RecordingSink};
pub use config::{
    MeasurementConfig, MotionConfig, MetricsConfig, ControllerConfig, EstimationMode
};
