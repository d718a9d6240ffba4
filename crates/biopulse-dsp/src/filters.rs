//! Channel filters for ECG and EEG
//!
//! All coefficients are designed once at construction from [`FilterConfig`]
//! and stay fixed for the lifetime of the filter.

use crate::biquad::{BiquadCoeffs, FilterChain, BUTTERWORTH_Q};
use crate::processor::SampleProcessor;
use biopulse_core::{config_error, BpResult};
use serde::{Deserialize, Serialize};

/// Filter design parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Local mains frequency (Hz) - 50 or 60
    pub mains_hz: f32,
    /// Notch stop-band width (Hz)
    pub notch_bandwidth_hz: f32,
    /// EEG low-pass cutoff (Hz)
    pub eeg_lowpass_hz: f32,
    /// ECG high-pass corner (Hz)
    pub ecg_highpass_hz: f32,
    /// ECG low-pass corner (Hz)
    pub ecg_lowpass_hz: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mains_hz: 50.0,
            notch_bandwidth_hz: 4.0,
            eeg_lowpass_hz: 45.0,
            ecg_highpass_hz: 0.5,
            ecg_lowpass_hz: 45.0,
        }
    }
}

impl FilterConfig {
    /// Defaults for 60 Hz mains regions
    pub fn mains_60hz() -> Self {
        Self {
            mains_hz: 60.0,
            ..Self::default()
        }
    }

    /// Notch quality factor
    pub fn notch_q(&self) -> f32 {
        self.mains_hz / self.notch_bandwidth_hz
    }

    pub fn validate(&self, sample_rate: f32) -> BpResult<()> {
        let nyquist = sample_rate / 2.0;

        if self.mains_hz != 50.0 && self.mains_hz != 60.0 {
            return Err(config_error!("Mains frequency must be 50 or 60Hz, got {}", self.mains_hz));
        }
        if !(self.notch_bandwidth_hz > 0.0 && self.notch_bandwidth_hz < self.mains_hz) {
            return Err(config_error!(
                "Notch bandwidth {}Hz must be positive and below the mains frequency",
                self.notch_bandwidth_hz
            ));
        }
        if self.ecg_highpass_hz >= self.ecg_lowpass_hz {
            return Err(config_error!(
                "ECG high-pass corner {}Hz must be below low-pass corner {}Hz",
                self.ecg_highpass_hz,
                self.ecg_lowpass_hz
            ));
        }

        let cutoffs = [
            ("mains", self.mains_hz),
            ("eeg_lowpass", self.eeg_lowpass_hz),
            ("ecg_highpass", self.ecg_highpass_hz),
            ("ecg_lowpass", self.ecg_lowpass_hz),
        ];
        for (name, freq) in cutoffs {
            if !(freq > 0.0 && freq < nyquist) {
                return Err(config_error!(
                    "{} frequency {}Hz must lie in (0, {}Hz)",
                    name,
                    freq,
                    nyquist
                ));
            }
        }

        Ok(())
    }
}

/// Mains interference rejection: two cascaded notch sections
#[derive(Debug, Clone)]
pub struct NotchFilter {
    chain: FilterChain,
}

impl NotchFilter {
    pub fn new(sample_rate: f32, config: &FilterConfig) -> BpResult<Self> {
        let coeffs = BiquadCoeffs::notch(sample_rate, config.mains_hz, config.notch_q())?;
        Ok(Self {
            chain: FilterChain::new("notch", [coeffs, coeffs]),
        })
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }
}

/// Single-section EEG band limit
#[derive(Debug, Clone)]
pub struct EegLowpass {
    chain: FilterChain,
}

impl EegLowpass {
    pub fn new(sample_rate: f32, config: &FilterConfig) -> BpResult<Self> {
        let coeffs = BiquadCoeffs::lowpass(sample_rate, config.eeg_lowpass_hz, BUTTERWORTH_Q)?;
        Ok(Self {
            chain: FilterChain::new("eeg_lowpass", [coeffs]),
        })
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }
}

/// QRS shaping filter: two high-pass sections, then two low-pass sections
#[derive(Debug, Clone)]
pub struct EcgBandFilter {
    chain: FilterChain,
}

impl EcgBandFilter {
    pub fn new(sample_rate: f32, config: &FilterConfig) -> BpResult<Self> {
        let hp = BiquadCoeffs::highpass(sample_rate, config.ecg_highpass_hz, BUTTERWORTH_Q)?;
        let lp = BiquadCoeffs::lowpass(sample_rate, config.ecg_lowpass_hz, BUTTERWORTH_Q)?;
        Ok(Self {
            chain: FilterChain::new("ecg_band", [hp, hp, lp, lp]),
        })
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }
}

/// Full EEG path: notch then low-pass
#[derive(Debug, Clone)]
pub struct EegFilter {
    notch: NotchFilter,
    lowpass: EegLowpass,
}

impl EegFilter {
    pub fn new(sample_rate: f32, config: &FilterConfig) -> BpResult<Self> {
        Ok(Self {
            notch: NotchFilter::new(sample_rate, config)?,
            lowpass: EegLowpass::new(sample_rate, config)?,
        })
    }

    pub fn magnitude_at(&self, sample_rate: f32, freq: f32) -> f32 {
        self.notch.chain().magnitude_at(sample_rate, freq)
            * self.lowpass.chain().magnitude_at(sample_rate, freq)
    }
}

macro_rules! delegate_to_chain {
    ($($ty:ty),+) => {
        $(
            impl SampleProcessor for $ty {
                #[inline]
                fn process_sample(&mut self, input: f32) -> f32 {
                    self.chain.process_sample(input)
                }

                fn name(&self) -> &str {
                    self.chain.name()
                }

                fn reset(&mut self) {
                    self.chain.reset();
                }
            }
        )+
    };
}

delegate_to_chain!(NotchFilter, EegLowpass, EcgBandFilter);

impl SampleProcessor for EegFilter {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        let notched = self.notch.process_sample(input);
        self.lowpass.process_sample(notched)
    }

    fn name(&self) -> &str {
        "eeg"
    }

    fn reset(&mut self) {
        self.notch.reset();
        self.lowpass.reset();
    }
}
