//! Waveform patterns for the two simulated channels

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// ECG channel waveform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EcgPattern {
    /// Triangular pulses on a zero baseline
    PulseTrain {
        /// Time between pulse onsets (ms)
        period_ms: f64,
        /// Pulse width (ms)
        pulse_ms: f64,
        /// Peak height
        amplitude: f32,
        /// Time of the first onset (ms)
        onset_ms: f64,
    },
    /// Zero baseline, no beats
    Flat,
}

impl Default for EcgPattern {
    /// 75 BPM train of 20ms pulses starting at 200ms
    fn default() -> Self {
        EcgPattern::PulseTrain {
            period_ms: 800.0,
            pulse_ms: 20.0,
            amplitude: 1.0,
            onset_ms: 200.0,
        }
    }
}

impl EcgPattern {
    /// Pulse train at `bpm` with the default shape
    pub fn at_heart_rate(bpm: f32) -> Self {
        match Self::default() {
            EcgPattern::PulseTrain {
                pulse_ms,
                amplitude,
                onset_ms,
                ..
            } => EcgPattern::PulseTrain {
                period_ms: 60_000.0 / bpm as f64,
                pulse_ms,
                amplitude,
                onset_ms,
            },
            flat => flat,
        }
    }

    /// Beat rate implied by the pattern
    pub fn heart_rate_bpm(&self) -> Option<f32> {
        match self {
            EcgPattern::PulseTrain { period_ms, .. } => Some((60_000.0 / period_ms) as f32),
            EcgPattern::Flat => None,
        }
    }

    /// Value at `phase_ms` into the current period
    ///
    /// Negative phases fall before the first onset.
    pub fn value_at_phase(&self, phase_ms: f64) -> f32 {
        match *self {
            EcgPattern::PulseTrain {
                pulse_ms,
                amplitude,
                ..
            } => {
                if phase_ms < 0.0 || phase_ms >= pulse_ms {
                    return 0.0;
                }
                let half = pulse_ms / 2.0;
                let shape = if phase_ms <= half {
                    phase_ms / half
                } else {
                    (pulse_ms - phase_ms) / half
                };
                amplitude * shape as f32
            }
            EcgPattern::Flat => 0.0,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EcgPattern::PulseTrain { .. } => "Triangular pulse train",
            EcgPattern::Flat => "Flat baseline",
        }
    }
}

/// EEG channel waveform: a sum of sinusoids given as `(freq_hz, amplitude)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EegPattern {
    Tones(Vec<(f32, f32)>),
}

impl Default for EegPattern {
    fn default() -> Self {
        Self::relaxed()
    }
}

impl EegPattern {
    /// Eyes-closed rest, alpha dominant
    pub fn relaxed() -> Self {
        EegPattern::Tones(vec![(10.0, 1.0), (6.0, 0.3), (20.0, 0.2)])
    }

    /// Active concentration, beta dominant
    pub fn focused() -> Self {
        EegPattern::Tones(vec![(20.0, 1.0), (10.0, 0.3), (35.0, 0.15)])
    }

    /// Single sinusoid
    pub fn tone(freq_hz: f32, amplitude: f32) -> Self {
        EegPattern::Tones(vec![(freq_hz, amplitude)])
    }

    pub fn value_at(&self, time_secs: f64) -> f32 {
        match self {
            EegPattern::Tones(tones) => tones
                .iter()
                .map(|&(freq, amplitude)| {
                    amplitude * (2.0 * PI * freq as f64 * time_secs).sin() as f32
                })
                .sum(),
        }
    }

    pub fn tones(&self) -> &[(f32, f32)] {
        match self {
            EegPattern::Tones(tones) => tones,
        }
    }

    /// Named presets
    pub fn presets() -> Vec<(&'static str, EegPattern)> {
        vec![("relaxed", Self::relaxed()), ("focused", Self::focused())]
    }
}
