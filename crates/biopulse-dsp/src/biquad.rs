//! Second-order IIR sections and cascades

use crate::processor::SampleProcessor;
use biopulse_core::{config_error, BpResult};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Q factor of a second-order Butterworth section
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Biquad coefficients, normalised so that a0 = 1
///
/// `H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Unity pass-through section
    pub const fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Second-order low-pass (bilinear transform, cookbook form)
    pub fn lowpass(sample_rate: f32, cutoff: f32, q: f32) -> BpResult<Self> {
        let (cos_w, alpha) = prewarp(sample_rate, cutoff, q)?;
        let a0 = 1.0 + alpha;
        let b1 = (1.0 - cos_w) / a0;

        Ok(Self {
            b0: b1 / 2.0,
            b1,
            b2: b1 / 2.0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// Second-order high-pass
    pub fn highpass(sample_rate: f32, cutoff: f32, q: f32) -> BpResult<Self> {
        let (cos_w, alpha) = prewarp(sample_rate, cutoff, q)?;
        let a0 = 1.0 + alpha;
        let b0 = (1.0 + cos_w) / 2.0 / a0;

        Ok(Self {
            b0,
            b1: -2.0 * b0,
            b2: b0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// Notch centred on `center` with quality factor `q` (center / bandwidth)
    pub fn notch(sample_rate: f32, center: f32, q: f32) -> BpResult<Self> {
        let (cos_w, alpha) = prewarp(sample_rate, center, q)?;
        let a0 = 1.0 + alpha;

        Ok(Self {
            b0: 1.0 / a0,
            b1: -2.0 * cos_w / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// Both poles strictly inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Gain magnitude at `freq` Hz
    pub fn magnitude_at(&self, sample_rate: f32, freq: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::identity()
    }
}

fn prewarp(sample_rate: f32, freq: f32, q: f32) -> BpResult<(f32, f32)> {
    let nyquist = sample_rate / 2.0;
    if !(freq > 0.0 && freq < nyquist) {
        return Err(config_error!(
            "Filter frequency {}Hz must lie in (0, {}Hz)",
            freq,
            nyquist
        ));
    }
    if !(q > 0.0 && q.is_finite()) {
        return Err(config_error!("Filter Q must be positive, got {}", q));
    }

    let w = 2.0 * PI * freq / sample_rate;
    Ok((w.cos(), w.sin() / (2.0 * q)))
}

/// One transposed direct-form-II section with its two delay values
///
/// The delay values stay on the scale of the signal, so a large DC offset
/// ahead of a low-corner high-pass does not cost precision in `f32`.
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;

        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;

        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn coefficients(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Current delay values `(z1, z2)`
    pub fn state(&self) -> (f32, f32) {
        (self.z1, self.z2)
    }
}

/// Ordered cascade of biquad sections with fixed coefficients
#[derive(Debug, Clone)]
pub struct FilterChain {
    name: String,
    sections: Vec<Biquad>,
}

impl FilterChain {
    pub fn new(name: impl Into<String>, coeffs: impl IntoIterator<Item = BiquadCoeffs>) -> Self {
        Self {
            name: name.into(),
            sections: coeffs.into_iter().map(Biquad::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(|s| s.coefficients().is_stable())
    }

    /// Combined gain magnitude of all sections at `freq` Hz
    pub fn magnitude_at(&self, sample_rate: f32, freq: f32) -> f32 {
        self.sections
            .iter()
            .map(|s| s.coefficients().magnitude_at(sample_rate, freq))
            .product()
    }
}

impl SampleProcessor for FilterChain {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        self.sections
            .iter_mut()
            .fold(input, |x, section| section.process(x))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 500.0;

    #[test]
    fn test_identity_passthrough() {
        let mut biquad = Biquad::new(BiquadCoeffs::identity());
        for x in [1.0, -2.0, 0.5] {
            assert_eq!(biquad.process(x), x);
        }
    }

    #[test]
    fn test_transposed_recurrence() {
        let coeffs = BiquadCoeffs {
            b0: 0.5,
            b1: 0.25,
            b2: 0.125,
            a1: -0.5,
            a2: 0.25,
        };
        let mut biquad = Biquad::new(coeffs);

        // y0 = 0.5, z1 = 0.25 + 0.25 = 0.5, z2 = 0.125 - 0.125 = 0
        assert!((biquad.process(1.0) - 0.5).abs() < 1e-6);
        assert_eq!(biquad.state(), (0.5, 0.0));

        // y1 = 0.5, z1 = 0.25, z2 = -0.125
        assert!((biquad.process(0.0) - 0.5).abs() < 1e-6);
        assert_eq!(biquad.state(), (0.25, -0.125));

        biquad.reset();
        assert_eq!(biquad.state(), (0.0, 0.0));
    }

    #[test]
    fn test_lowpass_dc_gain() {
        let coeffs = BiquadCoeffs::lowpass(FS, 45.0, BUTTERWORTH_Q).unwrap();
        assert!(coeffs.is_stable());
        assert!((coeffs.magnitude_at(FS, 0.0) - 1.0).abs() < 1e-4);

        let mut biquad = Biquad::new(coeffs);
        let mut y = 0.0;
        for _ in 0..500 {
            y = biquad.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_highpass_rejects_dc() {
        let coeffs = BiquadCoeffs::highpass(FS, 0.5, BUTTERWORTH_Q).unwrap();
        assert!(coeffs.is_stable());
        assert!(coeffs.magnitude_at(FS, 0.0) < 1e-4);
        assert!((coeffs.magnitude_at(FS, 20.0) - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_cutoff_is_half_power() {
        let coeffs = BiquadCoeffs::lowpass(FS, 45.0, BUTTERWORTH_Q).unwrap();
        let gain = coeffs.magnitude_at(FS, 45.0);
        assert!((gain - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_notch_zero_at_center() {
        let coeffs = BiquadCoeffs::notch(FS, 50.0, 12.5).unwrap();
        assert!(coeffs.is_stable());
        assert!(coeffs.magnitude_at(FS, 50.0) < 1e-3);
        assert!(coeffs.magnitude_at(FS, 10.0) > 0.99);
    }

    #[test]
    fn test_design_rejects_bad_frequencies() {
        assert!(BiquadCoeffs::lowpass(FS, 250.0, BUTTERWORTH_Q).is_err());
        assert!(BiquadCoeffs::highpass(FS, 0.0, BUTTERWORTH_Q).is_err());
        assert!(BiquadCoeffs::notch(FS, 50.0, 0.0).is_err());
        assert!(BiquadCoeffs::notch(FS, f32::NAN, 1.0).is_err());
    }

    #[test]
    fn test_chain_threads_sections() {
        let coeffs = BiquadCoeffs {
            b0: 0.5,
            ..BiquadCoeffs::identity()
        };
        let mut chain = FilterChain::new("halves", [coeffs, coeffs, coeffs]);

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.name(), "halves");
        assert!((chain.process_sample(8.0) - 1.0).abs() < 1e-6);
        assert!((chain.magnitude_at(FS, 10.0) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_chain_reset_zeroes_all_sections() {
        let coeffs = BiquadCoeffs::lowpass(FS, 45.0, BUTTERWORTH_Q).unwrap();
        let mut chain = FilterChain::new("lp", [coeffs, coeffs]);
        let first = chain.process_sample(1.0);
        chain.process_sample(1.0);

        chain.reset();
        assert!(chain.sections().iter().all(|s| s.state() == (0.0, 0.0)));
        assert_eq!(chain.process_sample(1.0), first);
    }
}
