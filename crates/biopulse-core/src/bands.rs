//! EEG frequency bands and the band-power vector

use crate::error::{BpError, BpResult};
use core::fmt;
use serde::{Deserialize, Serialize};

/// The five canonical EEG bands, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// All bands in ascending frequency order
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Half-open frequency range `[low_hz, high_hz)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl BandRange {
    pub const fn new(low_hz: f32, high_hz: f32) -> Self {
        Self { low_hz, high_hz }
    }

    #[inline]
    pub fn contains(&self, freq_hz: f32) -> bool {
        freq_hz >= self.low_hz && freq_hz < self.high_hz
    }

    pub fn width(&self) -> f32 {
        self.high_hz - self.low_hz
    }
}

/// Frequency boundaries for all five bands
///
/// Bands must be disjoint and ascending. Frequencies falling outside every
/// band are not assigned to any of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandLayout {
    pub delta: BandRange,
    pub theta: BandRange,
    pub alpha: BandRange,
    pub beta: BandRange,
    pub gamma: BandRange,
}

impl Default for BandLayout {
    fn default() -> Self {
        Self {
            delta: BandRange::new(0.5, 4.0),
            theta: BandRange::new(4.0, 8.0),
            alpha: BandRange::new(8.0, 13.0),
            beta: BandRange::new(13.0, 30.0),
            gamma: BandRange::new(30.0, 45.0),
        }
    }
}

impl BandLayout {
    pub fn range(&self, band: Band) -> BandRange {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    /// Band containing `freq_hz`, if any
    pub fn classify(&self, freq_hz: f32) -> Option<Band> {
        Band::ALL
            .iter()
            .copied()
            .find(|band| self.range(*band).contains(freq_hz))
    }

    /// Check that every band is non-empty, ascending, disjoint and below `nyquist_hz`
    pub fn validate(&self, nyquist_hz: f32) -> BpResult<()> {
        let mut previous_high = 0.0_f32;

        for band in Band::ALL {
            let range = self.range(band);
            let invalid = !range.low_hz.is_finite()
                || !range.high_hz.is_finite()
                || range.low_hz < previous_high
                || range.width() <= 0.0
                || range.high_hz > nyquist_hz;

            if invalid {
                return Err(BpError::InvalidBand {
                    name: band.name().to_string(),
                    low_hz: range.low_hz,
                    high_hz: range.high_hz,
                });
            }
            previous_high = range.high_hz;
        }

        Ok(())
    }
}

/// Power per band plus the total over the analyzed half-spectrum
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub delta: f32,
    pub theta: f32,
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
    pub total: f32,
}

impl BandPowers {
    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    fn get_mut(&mut self, band: Band) -> &mut f32 {
        match band {
            Band::Delta => &mut self.delta,
            Band::Theta => &mut self.theta,
            Band::Alpha => &mut self.alpha,
            Band::Beta => &mut self.beta,
            Band::Gamma => &mut self.gamma,
        }
    }

    /// Accumulate power into one band (the total is tracked separately)
    #[inline]
    pub fn add(&mut self, band: Band, power: f32) {
        *self.get_mut(band) += power;
    }

    /// Sum of the five band powers, excluding out-of-band power
    pub fn band_sum(&self) -> f32 {
        Band::ALL.iter().map(|b| self.get(*b)).sum()
    }

    /// Exponential moving average step: `self ← α·raw + (1−α)·self`
    pub fn blend(&mut self, raw: &BandPowers, alpha: f32) {
        let keep = 1.0 - alpha;
        for band in Band::ALL {
            let slot = self.get_mut(band);
            *slot = alpha * raw.get(band) + keep * *slot;
        }
        self.total = alpha * raw.total + keep * self.total;
    }

    /// Share of total power carried by `band`, guarded by `epsilon`
    #[inline]
    pub fn fraction(&self, band: Band, epsilon: f32) -> f32 {
        self.get(band) / (self.total + epsilon)
    }

    /// Fractions for all bands in [`Band::ALL`] order
    pub fn fractions(&self, epsilon: f32) -> [f32; 5] {
        Band::ALL.map(|band| self.fraction(band, epsilon))
    }

    /// Fractions scaled to percent, for display
    pub fn percentages(&self, epsilon: f32) -> [f32; 5] {
        self.fractions(epsilon).map(|f| f * 100.0)
    }

    /// Beta fraction over alpha fraction
    ///
    /// Finite for any non-negative input: with no alpha power the result is
    /// bounded by `beta_fraction / epsilon`.
    pub fn beta_alpha_ratio(&self, epsilon: f32) -> f32 {
        self.fraction(Band::Beta, epsilon) / (self.fraction(Band::Alpha, epsilon) + epsilon)
    }

    /// Band with the largest power, `None` when all bands are zero
    pub fn dominant(&self) -> Option<Band> {
        Band::ALL
            .iter()
            .copied()
            .filter(|b| self.get(*b) > 0.0)
            .max_by(|a, b| self.get(*a).total_cmp(&self.get(*b)))
    }
}
