//! Sway-Core: Foundation types for platform sway measurement
//!
//! Sensor samples, processed displacement samples, trial metrics and the
//! observable measurement state shared by every crate in the workspace.

pub mod samples;
pub mod measurement;
pub mod error;

pub use samples::*;
pub use measurement::*;
pub use error::{SwayError, SwayResult};
