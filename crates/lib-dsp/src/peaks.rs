//! Spectral peak detection.
//!
//! Finds local maxima of a magnitude spectrum above a height relative to
//! the strongest non-DC bin.

use crate::analyzer::FrequencyRange;
use lib_types::{Hertz, SpectrumResult};
use serde::{Deserialize, Serialize};

/// A detected spectral peak.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    /// Bin frequency.
    pub frequency: Hertz,
    /// Magnitude at the bin.
    pub magnitude: f64,
    /// Magnitude divided by the strongest non-DC bin.
    pub relative_magnitude: f64,
    /// Bin index in the spectrum.
    pub bin_index: usize,
}

/// Peak detection settings.
#[derive(Clone, Copy, Debug)]
pub struct PeakFinder {
    /// Minimum height relative to the strongest non-DC bin.
    relative_height: f64,
    /// Maximum number of peaks to report.
    max_peaks: usize,
    /// Minimum distance between reported peaks, in bins.
    min_distance: usize,
    /// Only bins in this range are considered.
    range: Option<FrequencyRange>,
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self {
            relative_height: 0.1,
            max_peaks: 3,
            min_distance: 1,
            range: None,
        }
    }
}

impl PeakFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relative_height(mut self, height: f64) -> Self {
        self.relative_height = height;
        self
    }

    pub fn with_max_peaks(mut self, max_peaks: usize) -> Self {
        self.max_peaks = max_peaks;
        self
    }

    pub fn with_min_distance(mut self, min_distance: usize) -> Self {
        self.min_distance = min_distance;
        self
    }

    pub fn with_range(mut self, range: FrequencyRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Peaks of `spectrum`, strongest first.
    pub fn find_peaks(&self, spectrum: &SpectrumResult) -> Vec<SpectralPeak> {
        find_peaks_in(&spectrum.frequencies, &spectrum.magnitudes, self)
    }
}

/// Peaks of `spectrum` using `finder`'s settings, strongest first.
pub fn find_peaks(spectrum: &SpectrumResult, finder: PeakFinder) -> Vec<SpectralPeak> {
    finder.find_peaks(spectrum)
}

fn find_peaks_in(
    frequencies: &[Hertz],
    magnitudes: &[f64],
    finder: &PeakFinder,
) -> Vec<SpectralPeak> {
    let n = magnitudes.len().min(frequencies.len());
    if n < 3 || finder.max_peaks == 0 {
        return Vec::new();
    }

    let in_range = |k: usize| finder.range.map_or(true, |r| r.contains(frequencies[k]));

    let reference = (1..n)
        .filter(|&k| in_range(k))
        .map(|k| magnitudes[k])
        .fold(0.0, f64::max);
    if reference <= 0.0 {
        return Vec::new();
    }
    let level = finder.relative_height * reference;

    // Local maxima, DC excluded; the first bin of a plateau wins
    let mut candidates: Vec<usize> = (1..n - 1)
        .filter(|&k| in_range(k))
        .filter(|&k| {
            let m = magnitudes[k];
            m >= level && m > magnitudes[k - 1] && m >= magnitudes[k + 1]
        })
        .collect();
    candidates.sort_by(|&a, &b| magnitudes[b].total_cmp(&magnitudes[a]).then(a.cmp(&b)));

    let mut peaks: Vec<SpectralPeak> = Vec::new();
    for k in candidates {
        if peaks.len() >= finder.max_peaks {
            break;
        }
        if peaks.iter().any(|p| p.bin_index.abs_diff(k) < finder.min_distance) {
            continue;
        }
        peaks.push(SpectralPeak {
            frequency: frequencies[k],
            magnitude: magnitudes[k],
            relative_magnitude: magnitudes[k] / reference,
            bin_index: k,
        });
    }

    peaks
}
