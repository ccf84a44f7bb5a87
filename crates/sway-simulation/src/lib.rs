//! Sway-Simulation: synthetic inertial sensor streams
//!
//! Stands in for the wearable sensor when testing, benchmarking or demoing
//! the measurement pipeline.

pub mod real_time_stream;
pub mod sway_patterns;
pub mod sway_simulator;

pub use sway_simulator::*;
pub use real_time_stream::*;
pub use sway_patterns::*;
