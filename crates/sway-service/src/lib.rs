//! Asynchronous measurement service around the sway engine
//!
//! One tokio task owns the [`sway_processing::MeasurementController`], reads
//! sensor samples from a broadcast channel and publishes every state change
//! on a watch channel. Finished trials go to a [`MeasurementStore`].

pub mod autostart;
pub mod measurement_service;
pub mod store;

pub use autostart::*;
pub use measurement_service::*;
pub use store::*;
