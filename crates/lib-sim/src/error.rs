//! Error types for the simulation adapter.

use thiserror::Error;

/// Errors that can occur while building or exchanging a source description.
#[derive(Debug, Error)]
pub enum SimError {
    /// Simplification tolerance is negative or non-finite.
    #[error("Invalid tolerance {0}: must be finite and >= 0")]
    InvalidTolerance(f64),

    /// A piecewise-linear source needs at least two breakpoints.
    #[error("Source needs at least 2 breakpoints, got {0}")]
    TooFewBreakpoints(usize),

    /// Times and currents differ in length.
    #[error("Breakpoint length mismatch: {times} times, {currents} currents")]
    LengthMismatch { times: usize, currents: usize },

    /// Breakpoint times must be strictly increasing and finite.
    #[error("Invalid breakpoint at index {index}: {reason}")]
    InvalidBreakpoint { index: usize, reason: String },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
