//! Error handling for biopulse
//!
//! Errors only surface while building or configuring processing stages.
//! The per-sample path is infallible: runtime conditions such as an
//! implausible RR interval or a zero power total are absorbed into the
//! shape of the output instead.

use thiserror::Error;

/// Result type alias for biopulse operations
pub type BpResult<T> = Result<T, BpError>;

/// Error type shared by all biopulse crates
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BpError {
    /// Configuration rejected during validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },

    /// Sampling rate outside the supported range
    #[error("Invalid sampling rate: {rate}Hz, valid range: {valid_range}")]
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f32,
        /// Valid range description
        valid_range: String,
    },

    /// Transform size must be a power of two
    #[error("Block size {size} is not a power of two")]
    BlockSizeNotPowerOfTwo {
        /// Requested block size
        size: usize,
    },

    /// Frequency band with empty, inverted or out-of-range bounds
    #[error("Invalid band {name}: [{low_hz}, {high_hz}) Hz")]
    InvalidBand {
        /// Band name
        name: String,
        /// Lower bound in Hz
        low_hz: f32,
        /// Upper bound in Hz
        high_hz: f32,
    },

    /// Timestamp arithmetic error
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        /// Description of timestamp issue
        reason: &'static str,
    },

    /// Malformed sample data
    #[error("Invalid signal data: {reason}")]
    InvalidSignalData {
        /// Description of the data issue
        reason: String,
    },

    /// Configuration (de)serialization failure
    #[error("Serialization error: {message}")]
    Serialization {
        /// Underlying serializer message
        message: String,
    },

    /// Signal generation failure
    #[error("Simulation error: {message}")]
    Simulation {
        /// Description of the failure
        message: String,
    },

    /// Filesystem error while loading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::BpError::InvalidConfig {
            message: format!($($arg)+),
        }
    };
}
