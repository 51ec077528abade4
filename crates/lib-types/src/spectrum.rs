//! Frequency-domain analysis results.
//!
//! A [`SpectrumResult`] is produced once per (waveform, analysis config) and
//! carries the sampling parameters it was computed with, so exported spectra
//! can always be traced back to their grid.

use crate::grid::grid_step;
use crate::units::{Hertz, Seconds};
use serde::{Deserialize, Serialize};

/// Window function applied before the transform.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowKind {
    /// No windowing. Keeps the energy of transient pulses intact.
    #[default]
    Rectangular,

    /// Hann (raised cosine) window.
    Hann,

    /// Hamming window.
    Hamming,

    /// Blackman window.
    Blackman,

    /// Kaiser-Bessel window with shape parameter `beta`.
    Kaiser { beta: f64 },
}

/// One-sided magnitude spectrum of a waveform plus derived scalars.
///
/// # Conventions
///
/// - `frequencies[k] = k / (n_samples * dt)` for `k = 0..=n_samples/2`,
///   with `dt = t_max / (n_samples - 1)`.
/// - `magnitudes[k] = |X_k| / n_samples`; the negative-frequency mirror is
///   discarded, not folded in.
/// - `bandwidth` spans the contiguous run of bins around the dominant bin
///   whose magnitude stays at or above `bandwidth_threshold` times the
///   dominant magnitude. The default threshold 0.5 is the half-amplitude
///   (-6 dB) point.
/// - `total_energy` is `dt * sum(y_i^2)` of the (windowed) analysis samples,
///   evaluated through Parseval's relation on the spectrum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    /// Bin frequencies, ascending from DC to Nyquist.
    pub frequencies: Vec<Hertz>,

    /// Magnitude per bin.
    pub magnitudes: Vec<f64>,

    /// Non-DC bin with the largest magnitude.
    pub dominant_frequency: Hertz,

    /// Magnitude at `dominant_frequency`.
    pub dominant_magnitude: f64,

    /// `band_high - band_low`.
    pub bandwidth: Hertz,

    /// Lowest bin of the above-threshold run.
    pub band_low: Hertz,

    /// Highest bin of the above-threshold run.
    pub band_high: Hertz,

    /// Signal energy (amplitude^2 * seconds).
    pub total_energy: f64,

    /// Analysis window length.
    pub t_max: Seconds,

    /// Number of uniform samples the transform ran on.
    pub n_samples: usize,

    /// Window applied before the transform.
    pub window: WindowKind,

    /// Fraction of the dominant magnitude used for `bandwidth`.
    pub bandwidth_threshold: f64,
}

impl SpectrumResult {
    /// Number of frequency bins.
    #[inline]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Sampling interval of the analysis grid.
    #[inline]
    pub fn dt(&self) -> Seconds {
        Seconds(grid_step(self.t_max.0, self.n_samples))
    }

    /// Spacing between adjacent bins.
    #[inline]
    pub fn frequency_resolution(&self) -> Hertz {
        (self.dt() * self.n_samples as f64).to_frequency()
    }

    /// Nyquist frequency of the analysis grid.
    #[inline]
    pub fn nyquist(&self) -> Hertz {
        (self.dt() * 2.0).to_frequency()
    }

    /// Magnitudes scaled so the largest bin is 1.0.
    ///
    /// An all-zero spectrum is returned unchanged.
    pub fn normalized_magnitudes(&self) -> Vec<f64> {
        let peak = self.magnitudes.iter().cloned().fold(0.0, f64::max);
        if peak > 0.0 {
            self.magnitudes.iter().map(|m| m / peak).collect()
        } else {
            self.magnitudes.clone()
        }
    }

    /// Magnitude at the bin nearest to `freq`.
    pub fn magnitude_at(&self, freq: Hertz) -> Option<f64> {
        if self.magnitudes.is_empty() || !freq.0.is_finite() || freq.0 < 0.0 {
            return None;
        }
        let idx = (freq.0 / self.frequency_resolution().0).round() as usize;
        self.magnitudes.get(idx).copied()
    }
}

/// Off-time decay measured after the final peak of a waveform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayStatistics {
    /// Time of the last sample at peak absolute amplitude.
    pub peak_time: f64,

    /// Time `|y|` falls through 90 % of the peak.
    pub t90: f64,

    /// Time `|y|` falls through 10 % of the peak.
    pub t10: f64,

    /// `t10 - t90`.
    pub fall_time: f64,
}

/// Time-domain summary statistics of a waveform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveformStatistics {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
    pub rms: f64,
    /// `dt * sum(y^2)` on the analysis grid.
    pub energy: f64,
    /// `None` when the waveform never falls below 10 % after its last peak.
    pub decay: Option<DecayStatistics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> SpectrumResult {
        SpectrumResult {
            frequencies: vec![Hertz(0.0), Hertz(1.0), Hertz(2.0)],
            magnitudes: vec![0.5, 2.0, 1.0],
            dominant_frequency: Hertz(1.0),
            dominant_magnitude: 2.0,
            bandwidth: Hertz(1.0),
            band_low: Hertz(1.0),
            band_high: Hertz(2.0),
            total_energy: 1.0,
            t_max: Seconds(0.8),
            n_samples: 5,
            window: WindowKind::Rectangular,
            bandwidth_threshold: 0.5,
        }
    }

    #[test]
    fn test_grid_derived_quantities() {
        let result = sample_result();
        // dt = 0.8 / 4 = 0.2, df = 1 / (5 * 0.2) = 1.0, nyquist = 2.5
        assert!((result.dt().0 - 0.2).abs() < 1e-12);
        assert!((result.frequency_resolution().0 - 1.0).abs() < 1e-12);
        assert!((result.nyquist().0 - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_grid_does_not_panic() {
        let mut json = serde_json::to_value(sample_result()).unwrap();
        json["n_samples"] = serde_json::json!(0);
        let result: SpectrumResult = serde_json::from_value(json).unwrap();

        assert!((result.dt().0 - 0.8).abs() < 1e-12);
        assert!(result.frequency_resolution().0.is_infinite());
        assert_eq!(result.magnitude_at(Hertz(1.0)), Some(0.5));
    }

    #[test]
    fn test_normalized_and_lookup() {
        let result = sample_result();
        assert_eq!(result.normalized_magnitudes(), vec![0.25, 1.0, 0.5]);
        assert_eq!(result.magnitude_at(Hertz(1.9)), Some(1.0));
        assert_eq!(result.magnitude_at(Hertz(40.0)), None);
        assert_eq!(result.magnitude_at(Hertz(-1.0)), None);
    }

    #[test]
    fn test_window_kind_serde() {
        let kaiser: WindowKind = serde_json::from_str(r#"{"type":"kaiser","beta":6.0}"#).unwrap();
        assert_eq!(kaiser, WindowKind::Kaiser { beta: 6.0 });
        let hann: WindowKind = serde_json::from_str(r#"{"type":"hann"}"#).unwrap();
        assert_eq!(hann, WindowKind::Hann);
    }
}
