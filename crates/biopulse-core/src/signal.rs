//! Sample containers for the two acquisition channels

use crate::error::{BpError, BpResult};
use crate::timestamp::{Duration, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum supported sampling rate in Hz
pub const MIN_SAMPLING_RATE: f32 = 100.0;
/// Maximum supported sampling rate in Hz
pub const MAX_SAMPLING_RATE: f32 = 4000.0;

/// Check that a sampling rate lies inside the supported range
pub fn validate_sampling_rate(rate: f32) -> BpResult<()> {
    if !rate.is_finite() || !(MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&rate) {
        return Err(BpError::InvalidSamplingRate {
            rate,
            valid_range: format!("{}-{}Hz", MIN_SAMPLING_RATE, MAX_SAMPLING_RATE),
        });
    }
    Ok(())
}

/// Acquisition channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Ecg,
    Eeg,
}

impl ChannelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Ecg => "ecg",
            ChannelKind::Eeg => "eeg",
        }
    }
}

/// One ADC reading of both channels taken on the same tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub ecg: f32,
    pub eeg: f32,
}

impl RawSample {
    #[inline]
    pub const fn new(ecg: f32, eeg: f32) -> Self {
        Self { ecg, eeg }
    }

    #[inline]
    pub fn channel(&self, kind: ChannelKind) -> f32 {
        match kind {
            ChannelKind::Ecg => self.ecg,
            ChannelKind::Eeg => self.eeg,
        }
    }
}

/// A run of consecutive samples for both channels
///
/// Channels are stored planar rather than interleaved; both vectors always
/// have the same length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalChunk {
    /// Unique identifier for this chunk
    pub id: Uuid,
    /// Timestamp of the first sample
    pub start: Timestamp,
    /// Sampling rate in Hz
    pub sample_rate: f32,
    pub ecg: Vec<f32>,
    pub eeg: Vec<f32>,
}

impl SignalChunk {
    /// Create a new chunk, validating rate and channel lengths
    pub fn new(start: Timestamp, sample_rate: f32, ecg: Vec<f32>, eeg: Vec<f32>) -> BpResult<Self> {
        validate_sampling_rate(sample_rate)?;

        if ecg.len() != eeg.len() {
            return Err(BpError::InvalidSignalData {
                reason: format!(
                    "Channel length mismatch: ecg has {} samples, eeg has {}",
                    ecg.len(),
                    eeg.len()
                ),
            });
        }

        if let Some(pos) = ecg.iter().chain(eeg.iter()).position(|v| !v.is_finite()) {
            return Err(BpError::InvalidSignalData {
                reason: format!("Non-finite sample at position {}", pos),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            start,
            sample_rate,
            ecg,
            eeg,
        })
    }

    /// Build a chunk from paired samples
    pub fn from_samples(start: Timestamp, sample_rate: f32, samples: &[RawSample]) -> BpResult<Self> {
        let ecg = samples.iter().map(|s| s.ecg).collect();
        let eeg = samples.iter().map(|s| s.eeg).collect();
        Self::new(start, sample_rate, ecg, eeg)
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.ecg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ecg.is_empty()
    }

    pub fn channel(&self, kind: ChannelKind) -> &[f32] {
        match kind {
            ChannelKind::Ecg => &self.ecg,
            ChannelKind::Eeg => &self.eeg,
        }
    }

    /// Iterate paired samples in acquisition order
    pub fn samples(&self) -> impl Iterator<Item = RawSample> + '_ {
        self.ecg
            .iter()
            .zip(self.eeg.iter())
            .map(|(&ecg, &eeg)| RawSample { ecg, eeg })
    }

    /// Time covered by this chunk
    pub fn duration(&self) -> Duration {
        let nanos = (self.len() as f64 * 1_000_000_000.0 / self.sample_rate as f64).round() as u64;
        Duration::from_nanos(nanos)
    }

    /// Timestamp of the sample following the last one in this chunk
    pub fn end(&self) -> Timestamp {
        Timestamp::from_nanos(self.start.as_nanos() + self.duration().as_nanos())
    }

    pub fn channel_stats(&self, kind: ChannelKind) -> ChannelStats {
        ChannelStats::calculate(self.channel(kind))
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f32,
    pub rms: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
}

impl ChannelStats {
    pub fn calculate(data: &[f32]) -> Self {
        if data.is_empty() {
            return Self::default();
        }

        let n = data.len() as f32;
        let mean = data.iter().sum::<f32>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f32>() / n).sqrt();
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;

        let min = data.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev: variance.sqrt(),
            min,
            max,
        }
    }

    pub fn peak_to_peak(&self) -> f32 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_rate_validation() {
        assert!(validate_sampling_rate(500.0).is_ok());
        assert!(validate_sampling_rate(100.0).is_ok());
        assert!(validate_sampling_rate(4000.0).is_ok());
        assert!(validate_sampling_rate(50.0).is_err());
        assert!(validate_sampling_rate(f32::NAN).is_err());
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = SignalChunk::new(Timestamp::ZERO, 500.0, vec![0.0; 500], vec![1.0; 500]).unwrap();

        assert_eq!(chunk.len(), 500);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.duration().as_millis(), 1000);
        assert_eq!(chunk.end().as_millis(), 1000);
        assert_eq!(chunk.channel(ChannelKind::Eeg)[0], 1.0);
    }

    #[test]
    fn test_chunk_rejects_mismatched_channels() {
        let result = SignalChunk::new(Timestamp::ZERO, 500.0, vec![0.0; 10], vec![0.0; 9]);
        assert!(matches!(result, Err(BpError::InvalidSignalData { .. })));
    }

    #[test]
    fn test_chunk_rejects_non_finite() {
        let result = SignalChunk::new(Timestamp::ZERO, 500.0, vec![0.0, f32::NAN], vec![0.0; 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_paired_samples() {
        let samples = [RawSample::new(1.0, 2.0), RawSample::new(3.0, 4.0)];
        let chunk = SignalChunk::from_samples(Timestamp::from_millis(10), 250.0, &samples).unwrap();

        let collected: Vec<RawSample> = chunk.samples().collect();
        assert_eq!(collected, samples);
        assert_eq!(collected[1].channel(ChannelKind::Ecg), 3.0);
    }

    #[test]
    fn test_channel_stats() {
        let stats = ChannelStats::calculate(&[1.0, -1.0, 1.0, -1.0]);
        assert!(stats.mean.abs() < 1e-6);
        assert!((stats.rms - 1.0).abs() < 1e-6);
        assert!((stats.std_dev - 1.0).abs() < 1e-6);
        assert_eq!(stats.peak_to_peak(), 2.0);

        assert_eq!(ChannelStats::calculate(&[]), ChannelStats::default());
    }
}
