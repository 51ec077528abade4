//! FFT operations using realfft.
//!
//! This module provides a high-level wrapper around the planner with:
//! - Planner caching for repeated transforms of the same length
//! - Real-to-complex forward transform of any length
//! - One-sided magnitude and Parseval energy helpers

use crate::error::{DspError, DspResult};
use num_complex::Complex64;
use realfft::RealFftPlanner;

/// FFT engine with a cached planner.
///
/// Planners are not shared between threads; each analysis task owns one.
pub struct FftEngine {
    /// Real FFT planner.
    real_planner: RealFftPlanner<f64>,
}

impl FftEngine {
    /// Create a new FFT engine.
    pub fn new() -> Self {
        Self {
            real_planner: RealFftPlanner::new(),
        }
    }

    /// Perform forward real-to-complex FFT.
    ///
    /// Input: N real samples (any N >= 2)
    /// Output: N/2 + 1 complex samples (Hermitian symmetry exploited)
    pub fn rfft(&mut self, data: &[f64]) -> DspResult<Vec<Complex64>> {
        let len = data.len();
        if len < 2 {
            return Err(DspError::InsufficientSamples { needed: 2, got: len });
        }

        let r2c = self.real_planner.plan_fft_forward(len);
        let mut input = data.to_vec();
        let mut output = r2c.make_output_vec();

        r2c.process(&mut input, &mut output)
            .map_err(|e| DspError::NumericalInstability(e.to_string()))?;

        Ok(output)
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// One-sided magnitude `|X_k| / n` of a half spectrum from an `n`-point rfft.
pub fn one_sided_magnitude(spectrum: &[Complex64], n: usize) -> Vec<f64> {
    let scale = 1.0 / n as f64;
    spectrum.iter().map(|c| c.norm() * scale).collect()
}

/// Signal energy `dt * sum(x^2)` recovered from an `n`-point half spectrum.
///
/// Interior bins stand for a positive/negative frequency pair and count
/// twice; DC counts once, and so does the Nyquist bin when `n` is even.
pub fn parseval_energy(spectrum: &[Complex64], n: usize, dt: f64) -> DspResult<f64> {
    let expected = n / 2 + 1;
    if spectrum.len() != expected {
        return Err(DspError::LengthMismatch {
            expected,
            actual: spectrum.len(),
        });
    }

    let mut sum = 0.0;
    for (k, c) in spectrum.iter().enumerate() {
        let paired = k != 0 && !(n % 2 == 0 && k == n / 2);
        sum += if paired { 2.0 * c.norm_sqr() } else { c.norm_sqr() };
    }

    Ok(sum * dt / n as f64)
}
