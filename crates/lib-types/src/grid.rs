//! Uniform time-grid helpers shared by the generator and the analyzer.
//!
//! Both sides build grids through [`linspace`] so that a waveform generated
//! on `[0, t_max]` with `n` nodes and an analysis grid with the same `t_max`
//! and `n` agree bit for bit.

/// `n` evenly spaced values from `start` to `end` inclusive.
///
/// The last value is exactly `end`. Returns an empty vector for `n == 0`
/// and `[start]` for `n == 1`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut grid: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            grid[n - 1] = end;
            grid
        }
    }
}

/// Spacing of an `n`-node grid spanning `[0, t_max]`.
#[inline]
pub fn grid_step(t_max: f64, n: usize) -> f64 {
    t_max / (n.max(2) - 1) as f64
}

/// Check whether `t` is (within `rel_tol` of the step) a uniform grid.
pub fn is_uniform(t: &[f64], rel_tol: f64) -> bool {
    if t.len() < 3 {
        return t.len() == 2 && t[1] > t[0];
    }
    let step = (t[t.len() - 1] - t[0]) / (t.len() - 1) as f64;
    if step <= 0.0 {
        return false;
    }
    t.windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= rel_tol * step)
}
