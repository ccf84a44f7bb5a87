//! Error handling for the sway measurement framework
//!
//! Transport gaps and position artifacts are not errors: they are reported as
//! data on [`crate::MeasurementState`]. The variants below cover configuration,
//! persistence and plumbing failures around the algorithmic core.

use core::fmt;

/// Result type alias for framework operations
pub type SwayResult<T> = Result<T, SwayError>;

/// Error type for all framework operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SwayError {
    /// A configuration value is out of range or inconsistent
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Trial duration must be finite and positive
    InvalidDuration {
        /// Requested duration in seconds
        duration_sec: f64,
    },

    /// Persistence collaborator failed
    Storage {
        /// Storage error description
        reason: String,
    },

    /// A command or data channel was closed
    ChannelClosed {
        /// Channel name
        channel: &'static str,
    },

    /// Serialization/deserialization error
    Serialization {
        /// Serialization error description
        reason: String,
    },

    /// Sensor simulation could not be set up
    Simulation {
        /// Simulation error description
        reason: String,
    },
}

impl fmt::Display for SwayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwayError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            SwayError::InvalidDuration { duration_sec } => {
                write!(f, "Invalid trial duration: {}s, must be finite and positive", duration_sec)
            }
            SwayError::Storage { reason } => {
                write!(f, "Storage error: {}", reason)
            }
            SwayError::ChannelClosed { channel } => {
                write!(f, "Channel closed: {}", channel)
            }
            SwayError::Serialization { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
            SwayError::Simulation { reason } => {
                write!(f, "Simulation error: {}", reason)
            }
        }
    }
}

impl std::error::Error for SwayError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::SwayError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}
