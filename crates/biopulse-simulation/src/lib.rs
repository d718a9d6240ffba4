//! biopulse-simulation: Synthetic ECG/EEG generation
//!
//! Deterministic pulse trains and band tones with optional noise and mains
//! hum, either generated offline or streamed at the sampling rate.

pub mod biosignal_simulator;
pub mod real_time_stream;
pub mod signal_patterns;

pub use biosignal_simulator::*;
pub use real_time_stream::*;
pub use signal_patterns::*;
