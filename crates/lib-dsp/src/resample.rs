//! Resampling waveforms onto the uniform analysis grid.
//!
//! Generated waveforms carry extra nodes at breakpoints and custom
//! waveforms may be arbitrarily spaced, while the transform needs `n`
//! uniform samples over `[0, t_max]`. Linear interpolation is used: it is
//! exact at nodes (so a waveform already on the analysis grid comes back
//! unchanged) and never overshoots at switching edges, which a sinc kernel
//! would.

use crate::error::{DspError, DspResult};
use crate::interpolation::interpolate_linear;
use lib_types::grid::{grid_step, linspace};
use lib_types::Waveform;

/// Check if two time steps are compatible (within tolerance).
///
/// # Arguments
///
/// * `dt1` - First time step
/// * `dt2` - Second time step
/// * `relative_tolerance` - Relative tolerance (e.g., 1e-6 for 0.0001%)
#[inline]
pub fn are_compatible_dt(dt1: f64, dt2: f64, relative_tolerance: f64) -> bool {
    let max_dt = dt1.max(dt2);
    if max_dt == 0.0 {
        return dt1 == dt2;
    }
    (dt1 - dt2).abs() / max_dt < relative_tolerance
}

/// Whether the waveform already sits on the `n`-node grid over `[0, t_max]`.
pub fn on_analysis_grid(waveform: &Waveform, t_max: f64, n: usize) -> bool {
    if waveform.len() != n || waveform.t_start() != 0.0 || waveform.t_end() != t_max {
        return false;
    }

    let dt = grid_step(t_max, n);
    waveform
        .t()
        .windows(2)
        .all(|w| are_compatible_dt(w[1] - w[0], dt, 1e-9))
}

/// Resample a waveform onto `n` uniform nodes spanning `[0, t_max]`.
///
/// Outside the waveform's sampled span the source is off, so those nodes
/// are zero.
///
/// # Returns
///
/// The `n` resampled amplitudes at `t_i = i * t_max / (n - 1)`.
pub fn resample_uniform(waveform: &Waveform, t_max: f64, n: usize) -> DspResult<Vec<f64>> {
    if n < 2 {
        return Err(DspError::InsufficientSamples { needed: 2, got: n });
    }
    if !(t_max.is_finite() && t_max > 0.0) {
        return Err(DspError::InvalidTimeWindow {
            t_max,
            reason: "must be finite and > 0".into(),
        });
    }

    if on_analysis_grid(waveform, t_max, n) {
        tracing::trace!("waveform already on analysis grid ({} samples)", n);
        return Ok(waveform.y().to_vec());
    }

    let targets = linspace(0.0, t_max, n);
    interpolate_linear(waveform.t(), waveform.y(), &targets, 0.0)
}
