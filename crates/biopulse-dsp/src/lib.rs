//! biopulse-dsp: Real-time ECG/EEG processing chain
//!
//! Per-sample filtering, R-peak detection and heart rate on the ECG channel;
//! filtering and block band-power analysis on the EEG channel. Everything is
//! driven one sample at a time by [`SampleScheduler`].

pub mod biquad;
pub mod config;
pub mod detector;
pub mod fft;
pub mod filters;
pub mod heartbeat;
pub mod processor;
pub mod scheduler;
pub mod spectral;

pub use biquad::{Biquad, BiquadCoeffs, FilterChain};
pub use config::MonitorConfig;
pub use detector::{DetectorConfig, PeakDetector};
pub use fft::Radix2Fft;
pub use filters::{EcgBandFilter, EegFilter, EegLowpass, FilterConfig, NotchFilter};
pub use heartbeat::{BeatGate, HeartRate, RrEvent, RrTracker};
pub use processor::{ProcessorType, SampleProcessor, TickBudget, TickTimer};
pub use scheduler::{AnalysisMode, SampleScheduler, SchedulerConfig, SchedulerStats, TickOutput};
pub use spectral::{
    BandPowerAnalyzer, SpectralBlock, SpectralConfig, SpectralReport, SMOOTHING_WARMUP_BLOCKS,
};
