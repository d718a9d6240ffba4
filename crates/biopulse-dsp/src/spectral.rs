//! Block spectral analysis of the EEG channel
//!
//! Filtered samples fill a [`SpectralBlock`] of N samples. Each full block is
//! transformed once, its half-spectrum power is summed into the five EEG
//! bands, and the band vector is smoothed across blocks with an exponential
//! moving average. Blocks do not overlap.

use crate::fft::Radix2Fft;
use biopulse_core::{config_error, Band, BandLayout, BandPowers, BpError, BpResult};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Blocks before the smoothed vector is considered settled
pub const SMOOTHING_WARMUP_BLOCKS: u64 = 3;

/// Spectral analysis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Transform size N (power of two)
    pub block_size: usize,
    /// EMA factor α in (0, 1]
    pub smoothing_alpha: f32,
    /// Guard added to divisors in fraction and ratio
    pub ratio_epsilon: f32,
    pub bands: BandLayout,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            block_size: 256,
            smoothing_alpha: 0.63,
            ratio_epsilon: 1e-6,
            bands: BandLayout::default(),
        }
    }
}

impl SpectralConfig {
    pub fn validate(&self, sample_rate: f32) -> BpResult<()> {
        if self.block_size < 2 || !self.block_size.is_power_of_two() {
            return Err(BpError::BlockSizeNotPowerOfTwo {
                size: self.block_size,
            });
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(config_error!(
                "Smoothing factor must lie in (0, 1], got {}",
                self.smoothing_alpha
            ));
        }
        if !(self.ratio_epsilon > 0.0 && self.ratio_epsilon.is_finite()) {
            return Err(config_error!(
                "Ratio epsilon must be positive, got {}",
                self.ratio_epsilon
            ));
        }
        self.bands.validate(sample_rate / 2.0)
    }

    /// Time covered by one block in seconds
    pub fn block_duration_secs(&self, sample_rate: f32) -> f32 {
        self.block_size as f32 / sample_rate
    }
}

/// Fixed-capacity accumulation buffer for one analysis block
#[derive(Debug, Clone)]
pub struct SpectralBlock {
    samples: Vec<f32>,
    capacity: usize,
}

impl SpectralBlock {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample; returns `true` when the block has just become full
    ///
    /// Samples pushed into a full block are dropped. The owner is expected
    /// to analyze or swap out the block as soon as this returns `true`.
    #[inline]
    pub fn push(&mut self, sample: f32) -> bool {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        }
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Start a new block
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Hand out the current samples and continue filling `spare`
    ///
    /// `spare` is cleared and grown to the block capacity if needed.
    pub fn swap(&mut self, mut spare: Vec<f32>) -> Vec<f32> {
        spare.clear();
        spare.reserve(self.capacity);
        std::mem::replace(&mut self.samples, spare)
    }
}

/// Result of analyzing one block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralReport {
    /// Zero-based index of the analyzed block
    pub block_index: u64,
    /// Band powers of this block alone
    pub raw: BandPowers,
    /// Band powers after smoothing
    pub smoothed: BandPowers,
    pub epsilon: f32,
    /// Smoothing still dominated by its zero seed; treat as low confidence
    pub warming_up: bool,
}

impl SpectralReport {
    /// Smoothed band fractions in [`Band::ALL`] order
    pub fn fractions(&self) -> [f32; 5] {
        self.smoothed.fractions(self.epsilon)
    }

    pub fn percentages(&self) -> [f32; 5] {
        self.smoothed.percentages(self.epsilon)
    }

    pub fn fraction(&self, band: Band) -> f32 {
        self.smoothed.fraction(band, self.epsilon)
    }

    /// Smoothed beta fraction over smoothed alpha fraction
    pub fn beta_alpha_ratio(&self) -> f32 {
        self.smoothed.beta_alpha_ratio(self.epsilon)
    }
}

/// FFT band-power analyzer with exponential smoothing
#[derive(Debug, Clone)]
pub struct BandPowerAnalyzer {
    fft: Radix2Fft,
    sample_rate: f32,
    /// Band of each bin in 1..N/2
    bin_bands: Vec<Option<Band>>,
    alpha: f32,
    epsilon: f32,
    smoothed: BandPowers,
    blocks: u64,
    scratch: Vec<Complex<f32>>,
}

impl BandPowerAnalyzer {
    pub fn new(sample_rate: f32, config: &SpectralConfig) -> BpResult<Self> {
        config.validate(sample_rate)?;

        let n = config.block_size;
        let resolution = sample_rate / n as f32;
        let bin_bands = (1..n / 2)
            .map(|i| config.bands.classify(i as f32 * resolution))
            .collect();

        Ok(Self {
            fft: Radix2Fft::new(n)?,
            sample_rate,
            bin_bands,
            alpha: config.smoothing_alpha,
            epsilon: config.ratio_epsilon,
            smoothed: BandPowers::default(),
            blocks: 0,
            scratch: vec![Complex::new(0.0, 0.0); n],
        })
    }

    pub fn block_size(&self) -> usize {
        self.fft.size()
    }

    /// Bin spacing in Hz
    pub fn frequency_resolution(&self) -> f32 {
        self.sample_rate / self.fft.size() as f32
    }

    /// Band powers of one block without touching the smoothed state
    ///
    /// A block shorter than N is zero-padded; extra samples are ignored.
    pub fn raw_powers(&mut self, block: &[f32]) -> BandPowers {
        self.fft.process_real(block, &mut self.scratch);

        let mut powers = BandPowers::default();
        for (bin, band) in self.scratch[1..].iter().zip(self.bin_bands.iter()) {
            let power = bin.norm_sqr();
            powers.total += power;
            if let Some(band) = band {
                powers.add(*band, power);
            }
        }
        powers
    }

    /// Analyze one full block and update the smoothed vector
    pub fn analyze(&mut self, block: &[f32]) -> SpectralReport {
        let raw = self.raw_powers(block);
        self.smoothed.blend(&raw, self.alpha);

        let report = SpectralReport {
            block_index: self.blocks,
            raw,
            smoothed: self.smoothed,
            epsilon: self.epsilon,
            warming_up: self.blocks < SMOOTHING_WARMUP_BLOCKS,
        };
        self.blocks += 1;

        debug!(
            block = report.block_index,
            delta = report.fraction(Band::Delta),
            theta = report.fraction(Band::Theta),
            alpha = report.fraction(Band::Alpha),
            beta = report.fraction(Band::Beta),
            gamma = report.fraction(Band::Gamma),
            ratio = report.beta_alpha_ratio(),
            warming_up = report.warming_up,
            "spectral block analyzed"
        );

        report
    }

    pub fn smoothed(&self) -> &BandPowers {
        &self.smoothed
    }

    pub fn blocks_analyzed(&self) -> u64 {
        self.blocks
    }

    /// True while the next report will still be flagged `warming_up`
    pub fn is_warming_up(&self) -> bool {
        self.blocks < SMOOTHING_WARMUP_BLOCKS
    }

    pub fn reset(&mut self) {
        self.smoothed = BandPowers::default();
        self.blocks = 0;
    }
}
