//! Monitor configuration
//!
//! Every constant of the processing chain lives here. A configuration is
//! fixed once a scheduler has been built from it; changing it means building
//! a new scheduler.

use crate::detector::DetectorConfig;
use crate::filters::FilterConfig;
use crate::scheduler::SchedulerConfig;
use crate::spectral::SpectralConfig;
use biopulse_core::{config_error, validate_sampling_rate, BpError, BpResult, Duration};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Configuration name/profile
    pub name: String,
    /// Fixed sampling rate of both channels (Hz)
    pub sample_rate_hz: f32,
    pub filters: FilterConfig,
    pub detector: DetectorConfig,
    pub spectral: SpectralConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::mains_50hz()
    }
}

impl MonitorConfig {
    /// 500Hz acquisition in a 50Hz mains region
    pub fn mains_50hz() -> Self {
        Self {
            name: "mains_50hz".to_string(),
            sample_rate_hz: 500.0,
            filters: FilterConfig::default(),
            detector: DetectorConfig::default(),
            spectral: SpectralConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// 500Hz acquisition in a 60Hz mains region
    pub fn mains_60hz() -> Self {
        Self {
            name: "mains_60hz".to_string(),
            filters: FilterConfig::mains_60hz(),
            ..Self::mains_50hz()
        }
    }

    /// Preset for a mains frequency given in Hz
    pub fn for_mains(mains_hz: u32) -> BpResult<Self> {
        match mains_hz {
            50 => Ok(Self::mains_50hz()),
            60 => Ok(Self::mains_60hz()),
            other => Err(config_error!("No preset for {}Hz mains", other)),
        }
    }

    /// Validate every section against the sampling rate
    pub fn validate(&self) -> BpResult<()> {
        validate_sampling_rate(self.sample_rate_hz)?;
        self.filters.validate(self.sample_rate_hz)?;
        self.detector.validate()?;
        self.spectral.validate(self.sample_rate_hz)?;
        self.scheduler.validate()?;

        // The refractory period has to leave room for the shortest accepted RR
        if self.detector.refractory_ms > self.detector.rr_min_ms {
            return Err(config_error!(
                "Refractory period {}ms exceeds minimum RR interval {}ms",
                self.detector.refractory_ms,
                self.detector.rr_min_ms
            ));
        }

        Ok(())
    }

    /// Time between two ticks
    pub fn sample_period(&self) -> Duration {
        Duration::from_nanos((1_000_000_000.0 / self.sample_rate_hz as f64).round() as u64)
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> BpResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| BpError::Serialization {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    /// Import and validate configuration from JSON
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> BpResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| BpError::Serialization {
            message: format!("Failed to deserialize config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> BpResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
