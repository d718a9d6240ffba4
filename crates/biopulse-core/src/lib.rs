//! biopulse-core: Foundation types for real-time ECG/EEG processing
//!
//! Sample containers, timestamps, EEG band definitions and the shared error type.

pub mod bands;
pub mod error;
pub mod signal;
pub mod timestamp;

pub use bands::{Band, BandLayout, BandPowers, BandRange};
pub use error::{BpError, BpResult};
pub use signal::{validate_sampling_rate, ChannelKind, ChannelStats, RawSample, SignalChunk};
pub use timestamp::{Duration, Timestamp};
