//! Time-domain linear interpolation on non-uniform grids.

use crate::error::{DspError, DspResult};

/// Interpolate samples `(t, y)` at every time in `targets`.
///
/// `t` must be strictly increasing and `targets` ascending; the sweep keeps a
/// cursor instead of searching per point. Targets coinciding with a node get
/// that node's value exactly. Targets outside `[t[0], t[last]]` evaluate to
/// `outside`.
pub fn interpolate_linear(
    t: &[f64],
    y: &[f64],
    targets: &[f64],
    outside: f64,
) -> DspResult<Vec<f64>> {
    if t.len() != y.len() {
        return Err(DspError::LengthMismatch {
            expected: t.len(),
            actual: y.len(),
        });
    }
    if t.len() < 2 {
        return Err(DspError::NonUniformResample(format!(
            "need at least 2 source samples, got {}",
            t.len()
        )));
    }

    let first = t[0];
    let last = t[t.len() - 1];
    let mut result = Vec::with_capacity(targets.len());
    let mut lower = 0;

    for &target in targets {
        if target < first || target > last {
            result.push(outside);
            continue;
        }

        // Advance to the bracketing interval [t[lower], t[lower + 1]]
        while lower + 1 < t.len() && t[lower + 1] <= target {
            lower += 1;
        }

        if t[lower] == target || lower + 1 == t.len() {
            result.push(y[lower]);
            continue;
        }

        let t0 = t[lower];
        let t1 = t[lower + 1];
        let frac = (target - t0) / (t1 - t0);
        result.push(y[lower] + frac * (y[lower + 1] - y[lower]));
    }

    Ok(result)
}

/// Time at which the segment `(t0, v0) -> (t1, v1)` crosses `level`.
///
/// Returns `t1` when the segment is flat.
#[inline]
pub fn crossing_time(t0: f64, v0: f64, t1: f64, v1: f64, level: f64) -> f64 {
    if v1 == v0 {
        return t1;
    }
    t0 + (level - v0) / (v1 - v0) * (t1 - t0)
}
