//! # lib-dsp
//!
//! Waveform generation and spectral analysis engine for TEM transmitter
//! waveforms.
//!
//! This crate provides the numerical core:
//!
//! - **Generation**: step, ramp, bipolar square, pulse shapes and custom
//!   samples, with switching edges pinned into the time grid
//! - **Resampling**: linear interpolation onto the uniform analysis grid
//! - **FFT**: real-to-complex transforms of any length
//! - **Spectral Analysis**: dominant frequency, bandwidth, energy, peaks
//! - **Batch Management**: parallel generate-and-analyze with per-request
//!   error reporting

pub mod error;
pub mod fft;
pub mod window;
pub mod interpolation;
pub mod resample;
pub mod params;
pub mod generator;
pub mod analyzer;
pub mod peaks;
pub mod manager;

pub use error::{DspError, GeneratorError};
pub use fft::FftEngine;
pub use params::{ParamValue, Parameters};
pub use generator::{GeneratorConfig, Shape, WaveformGenerator, WaveformSpec};
pub use analyzer::{analyze, AnalysisConfig, FrequencyRange, SpectralAnalyzer};
pub use peaks::{find_peaks, PeakFinder, SpectralPeak};
pub use manager::{
    BatchEntry, BatchError, BatchOutcome, ManagerConfig, StageError, WaveformManager,
    WaveformRequest,
};
