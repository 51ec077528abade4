//! Error types for generation and analysis.

use lib_types::WaveformError;
use thiserror::Error;

/// Errors that can occur during spectral analysis.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DspError {
    /// Analysis grid needs at least two samples.
    #[error("Insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    /// Analysis window is non-positive, non-finite, or shorter than the waveform.
    #[error("Invalid time window t_max = {t_max} s: {reason}")]
    InvalidTimeWindow { t_max: f64, reason: String },

    /// Waveform cannot be interpolated onto the analysis grid.
    #[error("Cannot resample onto uniform grid: {0}")]
    NonUniformResample(String),

    /// Input length mismatch.
    #[error("Input length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Out-of-range analysis setting.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transform backend reported a failure.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;

/// Errors that can occur while building a waveform.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GeneratorError {
    /// Tag does not name a supported waveform kind.
    #[error("Unsupported waveform type '{0}'")]
    UnsupportedWaveformType(String),

    /// Missing, malformed, or out-of-range parameter.
    #[error("Invalid parameter '{parameter}' for {kind} waveform: {reason}")]
    InvalidParameters {
        kind: String,
        parameter: String,
        reason: String,
    },

    /// Fewer than two distinct time samples would result.
    #[error("Degenerate {kind} waveform: {distinct} distinct time sample(s)")]
    DegenerateWaveform { kind: String, distinct: usize },
}

impl GeneratorError {
    /// Create an invalid parameter error.
    pub fn invalid(
        kind: impl ToString,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameters {
            kind: kind.to_string(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Map a sample-level invariant violation onto a generator error.
    pub(crate) fn from_waveform(kind: impl ToString, err: WaveformError) -> Self {
        match err {
            WaveformError::TooFewSamples(n) => Self::DegenerateWaveform {
                kind: kind.to_string(),
                distinct: n,
            },
            WaveformError::LengthMismatch { .. } => Self::invalid(kind, "y", err.to_string()),
            WaveformError::NonFinite { .. } => Self::invalid(kind, "samples", err.to_string()),
            other => Self::invalid(kind, "t", other.to_string()),
        }
    }
}

/// Result type for waveform generation.
pub type GeneratorResult<T> = Result<T, GeneratorError>;
