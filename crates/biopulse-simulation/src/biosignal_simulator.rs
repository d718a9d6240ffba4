//! Two-channel ECG/EEG simulator

use crate::signal_patterns::{EcgPattern, EegPattern};
use biopulse_core::{
    config_error, validate_sampling_rate, BpError, BpResult, Duration, RawSample, SignalChunk,
    Timestamp,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Slowest and fastest heart rate the simulator accepts (BPM)
pub const HEART_RATE_RANGE: (f32, f32) = (20.0, 300.0);

/// Additive disturbances applied to both channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f32,
    /// Mains hum amplitude (0.0 = none)
    pub mains_amplitude: f32,
    /// Mains hum frequency (Hz)
    pub mains_hz: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 0.0,
            mains_amplitude: 0.0,
            mains_hz: 50.0,
        }
    }
}

impl NoiseConfig {
    /// No noise and no hum
    pub fn clean() -> Self {
        Self::default()
    }

    /// Noise typical of a dry-electrode bench setup
    pub fn bench(mains_hz: f32) -> Self {
        Self {
            gaussian_std: 0.02,
            mains_amplitude: 0.2,
            mains_hz,
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub sample_rate_hz: f32,
    pub ecg: EcgPattern,
    pub eeg: EegPattern,
    pub noise: NoiseConfig,
    /// Random seed for reproducible noise
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 500.0,
            ecg: EcgPattern::default(),
            eeg: EegPattern::default(),
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> BpResult<()> {
        validate_sampling_rate(self.sample_rate_hz)?;

        if let EcgPattern::PulseTrain {
            period_ms,
            pulse_ms,
            amplitude,
            onset_ms,
        } = self.ecg
        {
            if !(pulse_ms > 0.0 && pulse_ms < period_ms) {
                return Err(config_error!(
                    "Pulse width {}ms must be positive and shorter than the period {}ms",
                    pulse_ms,
                    period_ms
                ));
            }
            if !amplitude.is_finite() || onset_ms < 0.0 {
                return Err(config_error!(
                    "Invalid pulse amplitude {} or onset {}ms",
                    amplitude,
                    onset_ms
                ));
            }
        }

        for &(freq, amplitude) in self.eeg.tones() {
            if !(freq > 0.0 && freq < self.sample_rate_hz / 2.0) || !amplitude.is_finite() {
                return Err(config_error!(
                    "EEG tone {}Hz (amplitude {}) cannot be sampled at {}Hz",
                    freq,
                    amplitude,
                    self.sample_rate_hz
                ));
            }
        }

        if !(self.noise.gaussian_std >= 0.0 && self.noise.gaussian_std.is_finite()) {
            return Err(config_error!(
                "Noise standard deviation must be non-negative, got {}",
                self.noise.gaussian_std
            ));
        }

        Ok(())
    }
}

/// Deterministic ECG/EEG source with a sample-index clock
pub struct BiosignalSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    normal_dist: Normal<f32>,
    sample_index: u64,
    /// Position inside the current ECG period (ms); negative before the first onset
    pulse_phase_ms: f64,
}

impl BiosignalSimulator {
    pub fn new(config: SimulatorConfig) -> BpResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist =
            Normal::new(0.0, config.noise.gaussian_std).map_err(|e| BpError::Simulation {
                message: format!("Failed to create normal distribution: {}", e),
            })?;

        Ok(Self {
            pulse_phase_ms: initial_phase(&config.ecg),
            config,
            rng,
            normal_dist,
            sample_index: 0,
        })
    }

    /// Produce the next sample of both channels
    pub fn next_sample(&mut self) -> RawSample {
        let fs = self.config.sample_rate_hz as f64;
        let time = self.sample_index as f64 / fs;

        let mut ecg = self.config.ecg.value_at_phase(self.pulse_phase_ms);
        let mut eeg = self.config.eeg.value_at(time);

        if self.config.noise.gaussian_std > 0.0 {
            ecg += self.normal_dist.sample(&mut self.rng);
            eeg += self.normal_dist.sample(&mut self.rng);
        }
        if self.config.noise.mains_amplitude != 0.0 {
            let hum = self.config.noise.mains_amplitude
                * (2.0 * PI * self.config.noise.mains_hz as f64 * time).sin() as f32;
            ecg += hum;
            eeg += hum;
        }

        self.advance_phase(1000.0 / fs);
        self.sample_index += 1;

        RawSample::new(ecg, eeg)
    }

    /// Generate `count` consecutive samples as one chunk
    pub fn generate_samples(&mut self, count: usize) -> BpResult<SignalChunk> {
        let start = self.now();
        let samples: Vec<RawSample> = (0..count).map(|_| self.next_sample()).collect();
        SignalChunk::from_samples(start, self.config.sample_rate_hz, &samples)
    }

    /// Generate the samples covering `duration`
    pub fn generate_chunk(&mut self, duration: Duration) -> BpResult<SignalChunk> {
        let count = (duration.as_secs_f64() * self.config.sample_rate_hz as f64).round() as usize;
        self.generate_samples(count)
    }

    /// Change the pulse train rate, keeping the current phase
    pub fn set_heart_rate(&mut self, bpm: f32) -> BpResult<()> {
        let (min, max) = HEART_RATE_RANGE;
        if !(min..=max).contains(&bpm) {
            return Err(config_error!(
                "Heart rate {} BPM outside {}-{} BPM",
                bpm,
                min,
                max
            ));
        }

        let period = 60_000.0 / bpm as f64;
        match self.config.ecg {
            EcgPattern::PulseTrain {
                pulse_ms,
                amplitude,
                onset_ms,
                ..
            } => {
                if pulse_ms >= period {
                    return Err(config_error!(
                        "Heart rate {} BPM leaves no room for a {}ms pulse",
                        bpm,
                        pulse_ms
                    ));
                }
                self.config.ecg = EcgPattern::PulseTrain {
                    period_ms: period,
                    pulse_ms,
                    amplitude,
                    onset_ms,
                };
                if self.pulse_phase_ms >= period {
                    self.pulse_phase_ms %= period;
                }
            }
            EcgPattern::Flat => {
                self.config.ecg = EcgPattern::at_heart_rate(bpm);
                self.pulse_phase_ms = initial_phase(&self.config.ecg);
            }
        }
        Ok(())
    }

    pub fn heart_rate_bpm(&self) -> Option<f32> {
        self.config.ecg.heart_rate_bpm()
    }

    /// Timestamp of the next sample
    pub fn now(&self) -> Timestamp {
        Timestamp::from_sample_index(self.sample_index, self.config.sample_rate_hz)
    }

    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    /// Restart from sample zero; the noise sequence continues
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
        self.pulse_phase_ms = initial_phase(&self.config.ecg);
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn advance_phase(&mut self, step_ms: f64) {
        if let EcgPattern::PulseTrain { period_ms, .. } = self.config.ecg {
            self.pulse_phase_ms += step_ms;
            if self.pulse_phase_ms >= period_ms {
                self.pulse_phase_ms -= period_ms;
            }
        }
    }
}

fn initial_phase(pattern: &EcgPattern) -> f64 {
    match pattern {
        EcgPattern::PulseTrain { onset_ms, .. } => -onset_ms,
        EcgPattern::Flat => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biopulse_core::{ChannelKind, ChannelStats};

    fn clean_config() -> SimulatorConfig {
        SimulatorConfig {
            seed: Some(7),
            ..SimulatorConfig::default()
        }
    }

    #[test]
    fn test_chunk_layout() {
        let mut sim = BiosignalSimulator::new(clean_config()).unwrap();
        let chunk = sim.generate_chunk(Duration::from_millis(1000)).unwrap();

        assert_eq!(chunk.len(), 500);
        assert_eq!(chunk.sample_rate, 500.0);
        assert_eq!(chunk.start, Timestamp::ZERO);

        let next = sim.generate_chunk(Duration::from_millis(100)).unwrap();
        assert_eq!(next.len(), 50);
        assert_eq!(next.start, chunk.end());
        assert_eq!(sim.samples_generated(), 550);
    }

    #[test]
    fn test_pulse_positions() {
        let mut sim = BiosignalSimulator::new(clean_config()).unwrap();
        let chunk = sim.generate_samples(1200).unwrap();

        // Pulse apex 10ms after each onset at 200ms, 1000ms, 1800ms
        let apexes: Vec<usize> = chunk
            .ecg
            .iter()
            .enumerate()
            .filter(|(_, &v)| (v - 1.0).abs() < 1e-6)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(apexes, vec![105, 505, 905]);

        assert_eq!(chunk.ecg[99], 0.0);
        assert_eq!(chunk.ecg[100], 0.0);
        assert!((chunk.ecg[101] - 0.2).abs() < 1e-6);
        assert_eq!(chunk.ecg[110], 0.0);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let config = SimulatorConfig {
            noise: NoiseConfig::bench(50.0),
            ..clean_config()
        };
        let a = BiosignalSimulator::new(config.clone()).unwrap().generate_samples(256).unwrap();
        let b = BiosignalSimulator::new(config).unwrap().generate_samples(256).unwrap();

        assert_eq!(a.ecg, b.ecg);
        assert_eq!(a.eeg, b.eeg);
    }

    #[test]
    fn test_gaussian_noise_level() {
        let config = SimulatorConfig {
            ecg: EcgPattern::Flat,
            eeg: EegPattern::Tones(Vec::new()),
            noise: NoiseConfig {
                gaussian_std: 0.5,
                mains_amplitude: 0.0,
                mains_hz: 50.0,
            },
            ..clean_config()
        };
        let chunk = BiosignalSimulator::new(config).unwrap().generate_samples(20_000).unwrap();

        let stats = chunk.channel_stats(ChannelKind::Ecg);
        assert!(stats.mean.abs() < 0.03);
        assert!((stats.std_dev - 0.5).abs() < 0.03);
    }

    #[test]
    fn test_tone_rms() {
        let config = SimulatorConfig {
            eeg: EegPattern::tone(10.0, 2.0),
            ..clean_config()
        };
        let chunk = BiosignalSimulator::new(config).unwrap().generate_samples(5_000).unwrap();
        let stats = ChannelStats::calculate(chunk.channel(ChannelKind::Eeg));
        assert!((stats.rms - 2.0 / 2f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_set_heart_rate() {
        let mut sim = BiosignalSimulator::new(clean_config()).unwrap();
        assert!((sim.heart_rate_bpm().unwrap() - 75.0).abs() < 1e-4);

        sim.set_heart_rate(60.0).unwrap();
        assert!((sim.heart_rate_bpm().unwrap() - 60.0).abs() < 1e-4);
        assert!(sim.set_heart_rate(500.0).is_err());
        assert!(sim.set_heart_rate(10.0).is_err());

        let chunk = sim.generate_samples(1300).unwrap();
        let apexes: Vec<usize> = chunk
            .ecg
            .iter()
            .enumerate()
            .filter(|(_, &v)| (v - 1.0).abs() < 1e-6)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(apexes, vec![105, 605, 1105]);
    }

    #[test]
    fn test_flat_pattern_gains_pulses() {
        let config = SimulatorConfig {
            ecg: EcgPattern::Flat,
            ..clean_config()
        };
        let mut sim = BiosignalSimulator::new(config).unwrap();
        assert!(sim.heart_rate_bpm().is_none());
        assert!(sim.generate_samples(100).unwrap().ecg.iter().all(|&v| v == 0.0));

        sim.set_heart_rate(75.0).unwrap();
        assert!(sim.heart_rate_bpm().is_some());
    }

    #[test]
    fn test_reset_time() {
        let mut sim = BiosignalSimulator::new(clean_config()).unwrap();
        let first = sim.generate_samples(300).unwrap();
        sim.reset_time();
        let second = sim.generate_samples(300).unwrap();

        assert_eq!(second.start, Timestamp::ZERO);
        assert_eq!(first.ecg, second.ecg);
        assert_eq!(first.eeg, second.eeg);
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = clean_config();
        config.sample_rate_hz = 50.0;
        assert!(BiosignalSimulator::new(config).is_err());

        let mut config = clean_config();
        config.eeg = EegPattern::tone(300.0, 1.0);
        assert!(BiosignalSimulator::new(config).is_err());

        let mut config = clean_config();
        config.ecg = EcgPattern::PulseTrain {
            period_ms: 10.0,
            pulse_ms: 20.0,
            amplitude: 1.0,
            onset_ms: 0.0,
        };
        assert!(BiosignalSimulator::new(config).is_err());

        let mut config = clean_config();
        config.noise.gaussian_std = -1.0;
        assert!(BiosignalSimulator::new(config).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let config = SimulatorConfig {
            eeg: EegPattern::focused(),
            noise: NoiseConfig::bench(60.0),
            ..clean_config()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: SimulatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
