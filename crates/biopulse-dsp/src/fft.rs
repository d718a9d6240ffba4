//! Iterative radix-2 FFT
//!
//! The bit-reversal width and the twiddle table are derived from the
//! transform size at construction, so any power-of-two block size works
//! without code changes.

use biopulse_core::{BpError, BpResult};
use num_complex::Complex;
use std::f32::consts::PI;

/// Forward FFT of a fixed power-of-two size
#[derive(Debug, Clone)]
pub struct Radix2Fft {
    size: usize,
    bits: u32,
    /// `e^{-2πik/N}` for k in 0..N/2
    twiddles: Vec<Complex<f32>>,
}

impl Radix2Fft {
    pub fn new(size: usize) -> BpResult<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(BpError::BlockSizeNotPowerOfTwo { size });
        }

        let twiddles = (0..size / 2)
            .map(|k| Complex::from_polar(1.0, -2.0 * PI * k as f32 / size as f32))
            .collect();

        Ok(Self {
            size,
            bits: size.trailing_zeros(),
            twiddles,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward transform
    ///
    /// `buffer` must hold exactly [`Radix2Fft::size`] values; in release
    /// builds a mismatched buffer is left untouched.
    pub fn process(&self, buffer: &mut [Complex<f32>]) {
        debug_assert_eq!(buffer.len(), self.size, "FFT buffer length mismatch");
        if buffer.len() != self.size {
            return;
        }

        self.bit_reverse(buffer);

        let mut len = 2;
        while len <= self.size {
            let half = len / 2;
            let stride = self.size / len;

            for start in (0..self.size).step_by(len) {
                for k in 0..half {
                    let w = self.twiddles[k * stride];
                    let even = buffer[start + k];
                    let odd = buffer[start + k + half] * w;

                    buffer[start + k] = even + odd;
                    buffer[start + k + half] = even - odd;
                }
            }

            len *= 2;
        }
    }

    /// Transform real samples into `output`
    ///
    /// Input shorter than `output` is zero-padded; extra input is ignored.
    pub fn process_real(&self, input: &[f32], output: &mut [Complex<f32>]) {
        for (i, slot) in output.iter_mut().enumerate() {
            *slot = Complex::new(input.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.process(output);
    }

    fn bit_reverse(&self, buffer: &mut [Complex<f32>]) {
        let shift = usize::BITS - self.bits;
        for i in 0..self.size {
            let j = i.reverse_bits() >> shift;
            if j > i {
                buffer.swap(i, j);
            }
        }
    }
}
