//! Spectral analysis of TEM waveforms.
//!
//! The analyzer resamples a waveform onto a uniform grid over
//! `[0, t_max]`, applies a window, and takes a real-to-complex FFT. From
//! the one-sided spectrum it derives the dominant frequency, the bandwidth
//! around it, and the signal energy.
//!
//! # Conventions
//!
//! - `dt = t_max / (n - 1)`, bin `k` sits at `k / (n * dt)`, `k = 0..=n/2`
//! - magnitudes are `|X_k| / n`, not doubled
//! - energy is Parseval-consistent: `dt * sum(w_i^2 * y_i^2)`
//!
//! A coarse analysis grid only degrades accuracy; it is not an error.

use crate::error::{DspError, DspResult};
use crate::fft::{one_sided_magnitude, parseval_energy, FftEngine};
use crate::interpolation::crossing_time;
use crate::resample::resample_uniform;
use crate::window::{apply_window, validate_window};
use lib_types::grid::grid_step;
use lib_types::{
    DecayStatistics, Hertz, Seconds, SpectrumResult, Waveform, WaveformStatistics, WindowKind,
};
use serde::{Deserialize, Serialize};

/// Frequency interval searched for the dominant bin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    /// Lowest frequency considered (inclusive).
    #[serde(default)]
    pub min: Hertz,

    /// Highest frequency considered (inclusive); `None` means Nyquist.
    #[serde(default)]
    pub max: Option<Hertz>,
}

impl FrequencyRange {
    pub fn new(min: Hertz, max: Option<Hertz>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, freq: Hertz) -> bool {
        freq.0 >= self.min.0 && self.max.map_or(true, |max| freq.0 <= max.0)
    }

    fn validate(&self) -> DspResult<()> {
        if !(self.min.0.is_finite() && self.min.0 >= 0.0) {
            return Err(DspError::InvalidConfig(format!(
                "search range minimum must be finite and >= 0, got {}",
                self.min.0
            )));
        }
        if let Some(max) = self.max {
            if !(max.0 >= self.min.0) {
                return Err(DspError::InvalidConfig(format!(
                    "search range [{}, {}] Hz is empty",
                    self.min.0, max.0
                )));
            }
        }
        Ok(())
    }
}

/// Analysis grid and post-processing settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Length of the analysis window starting at `t = 0`.
    pub t_max: Seconds,

    /// Number of uniform samples.
    pub n_samples: usize,

    /// Window applied before the transform.
    pub window: WindowKind,

    /// Fraction of the dominant magnitude bounding the bandwidth.
    pub bandwidth_threshold: f64,

    /// Restricts the dominant-frequency search.
    pub search_range: Option<FrequencyRange>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            t_max: Seconds(1.0),
            n_samples: 100_000,
            window: WindowKind::Rectangular,
            bandwidth_threshold: 0.5,
            search_range: None,
        }
    }
}

impl AnalysisConfig {
    pub fn with_t_max(mut self, t_max: Seconds) -> Self {
        self.t_max = t_max;
        self
    }

    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_window(mut self, window: WindowKind) -> Self {
        self.window = window;
        self
    }

    pub fn with_bandwidth_threshold(mut self, threshold: f64) -> Self {
        self.bandwidth_threshold = threshold;
        self
    }

    pub fn with_search_range(mut self, range: FrequencyRange) -> Self {
        self.search_range = Some(range);
        self
    }

    /// Sampling interval of the analysis grid.
    #[inline]
    pub fn dt(&self) -> f64 {
        grid_step(self.t_max.0, self.n_samples)
    }

    /// Range checks on every field.
    pub fn validate(&self) -> DspResult<()> {
        if self.n_samples < 2 {
            return Err(DspError::InsufficientSamples {
                needed: 2,
                got: self.n_samples,
            });
        }
        if !self.t_max.is_positive() {
            return Err(DspError::InvalidTimeWindow {
                t_max: self.t_max.0,
                reason: "must be finite and > 0".into(),
            });
        }
        if !(self.bandwidth_threshold > 0.0 && self.bandwidth_threshold <= 1.0) {
            return Err(DspError::InvalidConfig(format!(
                "bandwidth_threshold must be in (0, 1], got {}",
                self.bandwidth_threshold
            )));
        }
        validate_window(self.window).map_err(DspError::InvalidConfig)?;
        if let Some(range) = &self.search_range {
            range.validate()?;
        }
        Ok(())
    }
}

/// Spectrum analyzer bound to one validated [`AnalysisConfig`].
///
/// FFT planners are created per call, so one analyzer can be shared by
/// every task of a parallel batch.
#[derive(Clone, Debug)]
pub struct SpectralAnalyzer {
    config: AnalysisConfig,
}

impl SpectralAnalyzer {
    /// Create an analyzer, rejecting out-of-range settings.
    pub fn new(config: AnalysisConfig) -> DspResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Waveform amplitudes on the uniform analysis grid (unwindowed).
    pub fn resample(&self, waveform: &Waveform) -> DspResult<Vec<f64>> {
        let t_max = self.config.t_max.0;

        if waveform.t_end() > t_max {
            return Err(DspError::InvalidTimeWindow {
                t_max,
                reason: format!(
                    "shorter than the waveform, which ends at {} s",
                    waveform.t_end()
                ),
            });
        }
        if waveform.t_start() < 0.0 {
            tracing::debug!(
                "ignoring {} {} sample(s) before t = 0",
                waveform.t().iter().filter(|&&t| t < 0.0).count(),
                waveform.kind()
            );
        }

        resample_uniform(waveform, t_max, self.config.n_samples)
    }

    /// Compute the one-sided spectrum and its derived quantities.
    pub fn analyze(&self, waveform: &Waveform) -> DspResult<SpectrumResult> {
        let n = self.config.n_samples;
        let dt = self.config.dt();

        let mut samples = self.resample(waveform)?;
        apply_window(&mut samples, self.config.window);

        let mut engine = FftEngine::new();
        let spectrum = engine.rfft(&samples)?;
        let magnitudes = one_sided_magnitude(&spectrum, n);
        let total_energy = parseval_energy(&spectrum, n, dt)?;

        let df = 1.0 / (n as f64 * dt);
        let frequencies: Vec<Hertz> =
            (0..magnitudes.len()).map(|k| Hertz(k as f64 * df)).collect();

        let dominant = self.dominant_bin(&frequencies, &magnitudes)?;
        let dominant_magnitude = magnitudes[dominant];
        let (low, high) = if dominant_magnitude > 0.0 {
            band_edges(&magnitudes, dominant, self.config.bandwidth_threshold * dominant_magnitude)
        } else {
            tracing::warn!("{} waveform has an all-zero spectrum", waveform.kind());
            (dominant, dominant)
        };

        tracing::debug!(
            "{} spectrum: {} bins, df = {:.4} Hz, dominant {:.4} Hz, band [{:.4}, {:.4}] Hz",
            waveform.kind(),
            magnitudes.len(),
            df,
            frequencies[dominant].0,
            frequencies[low].0,
            frequencies[high].0
        );

        Ok(SpectrumResult {
            dominant_frequency: frequencies[dominant],
            dominant_magnitude,
            bandwidth: Hertz(frequencies[high].0 - frequencies[low].0),
            band_low: frequencies[low],
            band_high: frequencies[high],
            total_energy,
            t_max: self.config.t_max,
            n_samples: n,
            window: self.config.window,
            bandwidth_threshold: self.config.bandwidth_threshold,
            frequencies,
            magnitudes,
        })
    }

    /// Time-domain statistics on the analysis grid plus decay timing on the
    /// native samples.
    pub fn statistics(&self, waveform: &Waveform) -> DspResult<WaveformStatistics> {
        let samples = self.resample(waveform)?;
        let n = samples.len() as f64;

        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let sum_sq = samples.iter().map(|v| v * v).sum::<f64>();
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Ok(WaveformStatistics {
            mean,
            std: variance.sqrt(),
            min,
            max,
            peak_to_peak: max - min,
            rms: (sum_sq / n).sqrt(),
            energy: sum_sq * self.config.dt(),
            decay: decay_statistics(waveform),
        })
    }

    /// First bin `k >= 1` with the largest magnitude inside the search range.
    fn dominant_bin(&self, frequencies: &[Hertz], magnitudes: &[f64]) -> DspResult<usize> {
        let mut best: Option<usize> = None;
        for k in 1..magnitudes.len() {
            if let Some(range) = &self.config.search_range {
                if !range.contains(frequencies[k]) {
                    continue;
                }
            }
            match best {
                Some(b) if magnitudes[k] <= magnitudes[b] => {}
                _ => best = Some(k),
            }
        }

        best.ok_or_else(|| {
            DspError::InvalidConfig(format!(
                "no frequency bin inside the search range (resolution {:.4} Hz, nyquist {:.4} Hz)",
                frequencies.get(1).map_or(0.0, |f| f.0),
                frequencies.last().map_or(0.0, |f| f.0)
            ))
        })
    }
}

/// Analyze `waveform` with a one-off analyzer.
pub fn analyze(waveform: &Waveform, config: &AnalysisConfig) -> DspResult<SpectrumResult> {
    SpectralAnalyzer::new(config.clone())?.analyze(waveform)
}

/// Contiguous run of bins around `center` with magnitude `>= level`.
fn band_edges(magnitudes: &[f64], center: usize, level: f64) -> (usize, usize) {
    let mut low = center;
    while low > 0 && magnitudes[low - 1] >= level {
        low -= 1;
    }
    let mut high = center;
    while high + 1 < magnitudes.len() && magnitudes[high + 1] >= level {
        high += 1;
    }
    (low, high)
}

/// 90 % / 10 % fall timing after the last sample at peak `|y|`.
fn decay_statistics(waveform: &Waveform) -> Option<DecayStatistics> {
    let t = waveform.t();
    let abs: Vec<f64> = waveform.y().iter().map(|v| v.abs()).collect();
    let peak = waveform.peak_abs();
    if peak <= 0.0 {
        return None;
    }

    let peak_idx = abs.iter().rposition(|&v| v == peak)?;
    let crossing = |level: f64, from: usize| -> Option<(usize, f64)> {
        (from + 1..abs.len())
            .find(|&i| abs[i] <= level)
            .map(|i| (i, crossing_time(t[i - 1], abs[i - 1], t[i], abs[i], level)))
    };

    let (i90, t90) = crossing(0.9 * peak, peak_idx)?;
    let (_, t10) = crossing(0.1 * peak, i90 - 1)?;

    Some(DecayStatistics {
        peak_time: t[peak_idx],
        t90,
        t10,
        fall_time: t10 - t90,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::grid::linspace;
    use lib_types::WaveformKind;
    use std::collections::BTreeMap;
    use std::f64::consts::PI;

    fn custom(t: Vec<f64>, y: Vec<f64>) -> Waveform {
        Waveform::new(t, y, WaveformKind::Custom, BTreeMap::new()).unwrap()
    }

    fn small_config() -> AnalysisConfig {
        AnalysisConfig::default().with_n_samples(1000)
    }

    #[test]
    fn test_config_validation() {
        assert!(AnalysisConfig::default().validate().is_ok());

        let err = SpectralAnalyzer::new(AnalysisConfig::default().with_n_samples(1)).unwrap_err();
        assert!(matches!(err, DspError::InsufficientSamples { needed: 2, got: 1 }));

        let config = AnalysisConfig::default().with_t_max(Seconds(-1.0));
        let err = SpectralAnalyzer::new(config).unwrap_err();
        assert!(matches!(err, DspError::InvalidTimeWindow { .. }));

        let config = AnalysisConfig::default().with_bandwidth_threshold(1.5);
        let err = SpectralAnalyzer::new(config).unwrap_err();
        assert!(matches!(err, DspError::InvalidConfig(_)));

        let range = FrequencyRange::new(Hertz(100.0), Some(Hertz(10.0)));
        let config = AnalysisConfig::default().with_search_range(range);
        let err = SpectralAnalyzer::new(config).unwrap_err();
        assert!(matches!(err, DspError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"t_max": 0.5, "window": {"type": "hann"}}"#).unwrap();
        assert_eq!(config.t_max, Seconds(0.5));
        assert_eq!(config.n_samples, 100_000);
        assert_eq!(config.window, WindowKind::Hann);
        assert_eq!(config.bandwidth_threshold, 0.5);
    }

    #[test]
    fn test_sinusoid_dominant_frequency() {
        // 50 whole cycles of a 50 Hz sine over the 1 s window
        let n = 1000;
        let t = linspace(0.0, 1.0, n);
        let y: Vec<f64> = t.iter().map(|&x| (2.0 * PI * 50.0 * x).sin()).collect();
        let wf = custom(t, y);

        let result = analyze(&wf, &small_config()).unwrap();
        let df = result.frequency_resolution().0;
        assert!((result.dominant_frequency.0 - 50.0).abs() <= df);
        assert_eq!(result.len(), n / 2 + 1);
        assert!(result.bandwidth.0 >= 0.0 && result.bandwidth.0 <= result.nyquist().0);
    }

    #[test]
    fn test_search_range_restricts_dominant() {
        let t = linspace(0.0, 1.0, 1000);
        let y: Vec<f64> = t
            .iter()
            .map(|&x| (2.0 * PI * 20.0 * x).sin() + 0.5 * (2.0 * PI * 120.0 * x).sin())
            .collect();
        let wf = custom(t, y);

        let unrestricted = analyze(&wf, &small_config()).unwrap();
        assert!((unrestricted.dominant_frequency.0 - 20.0).abs() < 2.0);

        let config = small_config().with_search_range(FrequencyRange::new(Hertz(60.0), None));
        let restricted = analyze(&wf, &config).unwrap();
        assert!((restricted.dominant_frequency.0 - 120.0).abs() < 2.0);
    }

    #[test]
    fn test_rejects_window_shorter_than_waveform() {
        let wf = custom(vec![0.0, 2.0], vec![1.0, 0.0]);
        let err = analyze(&wf, &small_config()).unwrap_err();
        assert!(matches!(err, DspError::InvalidTimeWindow { .. }));
    }

    #[test]
    fn test_energy_matches_time_domain() {
        let wf = custom(vec![0.0, 0.1, 0.2], vec![1.0, 1.0, 0.0]);
        let analyzer = SpectralAnalyzer::new(small_config()).unwrap();

        let samples = analyzer.resample(&wf).unwrap();
        let dt = analyzer.config().dt();
        let expected: f64 = samples.iter().map(|v| v * v).sum::<f64>() * dt;

        let result = analyzer.analyze(&wf).unwrap();
        assert!((result.total_energy - expected).abs() < 1e-9 * expected);

        let stats = analyzer.statistics(&wf).unwrap();
        assert!((stats.energy - expected).abs() < 1e-9 * expected);
    }

    #[test]
    fn test_statistics() {
        let t = linspace(0.0, 1.0, 1000);
        let y: Vec<f64> = t.iter().map(|&x| (2.0 * PI * 10.0 * x).sin()).collect();
        let wf = custom(t, y);

        let stats = SpectralAnalyzer::new(small_config()).unwrap().statistics(&wf).unwrap();
        assert!(stats.mean.abs() < 1e-3);
        assert!((stats.rms - 1.0 / 2f64.sqrt()).abs() < 1e-2);
        assert!((stats.peak_to_peak - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_decay_statistics() {
        let wf = custom(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 1.0, 0.0, 0.0]);
        let decay = decay_statistics(&wf).unwrap();
        assert_eq!(decay.peak_time, 1.0);
        assert!((decay.t90 - 1.1).abs() < 1e-12);
        assert!((decay.t10 - 1.9).abs() < 1e-12);
        assert!((decay.fall_time - 0.8).abs() < 1e-12);

        let flat = custom(vec![0.0, 1.0], vec![1.0, 1.0]);
        assert!(decay_statistics(&flat).is_none());
    }

    #[test]
    fn test_band_edges() {
        let mags = [5.0, 4.0, 1.0, 3.0, 6.0, 3.5, 2.0];
        assert_eq!(band_edges(&mags, 4, 3.0), (3, 5));
        assert_eq!(band_edges(&mags, 1, 2.5), (0, 1));
    }
}
