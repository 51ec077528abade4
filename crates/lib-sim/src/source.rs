//! Piecewise-linear transmitter source.
//!
//! Generated waveforms carry thousands of samples, most of them on straight
//! segments. Simulators step through source breakpoints, so the source is
//! reduced to the points where the slope changes before it is handed over.

use crate::error::SimError;
use lib_types::{Amperes, Seconds, Waveform};
use serde::{Deserialize, Serialize};

/// Transmitter current as a function of time.
pub trait SourceCurrent {
    /// Current at time `t`.
    fn eval(&self, t: Seconds) -> Amperes;

    /// Current at each time in `ts`.
    fn eval_many(&self, ts: &[Seconds]) -> Vec<Amperes> {
        ts.iter().map(|&t| self.eval(t)).collect()
    }
}

impl SourceCurrent for Waveform {
    fn eval(&self, t: Seconds) -> Amperes {
        Amperes(self.value_at(t.0))
    }
}

/// Breakpoint description of a source current.
///
/// Serialized as
/// `{"kind":"piecewise_linear","off_time":…,"times":[…],"currents":[…]}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename = "piecewise_linear")]
pub struct PiecewiseLinearSource {
    /// Instant the current returns to zero for good.
    off_time: Seconds,

    /// Breakpoint times, strictly increasing.
    times: Vec<f64>,

    /// Current at each breakpoint.
    currents: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawSource {
    PiecewiseLinear { times: Vec<f64>, currents: Vec<f64> },
}

impl PiecewiseLinearSource {
    /// Build a source from explicit breakpoints.
    pub fn from_breakpoints(times: Vec<f64>, currents: Vec<f64>) -> Result<Self, SimError> {
        if times.len() != currents.len() {
            return Err(SimError::LengthMismatch {
                times: times.len(),
                currents: currents.len(),
            });
        }
        if times.len() < 2 {
            return Err(SimError::TooFewBreakpoints(times.len()));
        }
        for (i, (t, c)) in times.iter().zip(&currents).enumerate() {
            if !t.is_finite() || !c.is_finite() {
                return Err(SimError::InvalidBreakpoint {
                    index: i,
                    reason: "non-finite value".into(),
                });
            }
            if i > 0 && *t <= times[i - 1] {
                return Err(SimError::InvalidBreakpoint {
                    index: i,
                    reason: "times must be strictly increasing".into(),
                });
            }
        }

        let off_time = Seconds(off_time(&times, &currents));
        Ok(Self {
            off_time,
            times,
            currents,
        })
    }

    /// Reduce a waveform to its slope-change points.
    ///
    /// Interior samples are dropped while every skipped sample stays within
    /// `tolerance * peak` of the straight line between the kept neighbours.
    /// `tolerance = 0` removes exactly collinear points only.
    pub fn from_waveform(waveform: &Waveform, tolerance: f64) -> Result<Self, SimError> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(SimError::InvalidTolerance(tolerance));
        }

        let (t, y) = (waveform.t(), waveform.y());
        let peak = waveform.peak_abs();
        let max_dev = tolerance * peak + 1e-12 * peak.max(f64::MIN_POSITIVE);
        let keep = simplify(t, y, max_dev);

        tracing::debug!(
            "Simplified {} waveform from {} to {} breakpoints",
            waveform.kind(),
            t.len(),
            keep.len()
        );

        Self::from_breakpoints(
            keep.iter().map(|&i| t[i]).collect(),
            keep.iter().map(|&i| y[i]).collect(),
        )
    }

    /// Parse the JSON exchange format.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let RawSource::PiecewiseLinear { times, currents } = serde_json::from_str(json)?;
        Self::from_breakpoints(times, currents)
    }

    /// Encode in the JSON exchange format.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Scale currents so the largest magnitude equals `peak`.
    pub fn scaled_to_peak(mut self, peak: Amperes) -> Self {
        let current_peak = self.currents.iter().fold(0.0f64, |m, c| m.max(c.abs()));
        if current_peak > 0.0 {
            let factor = peak.0 / current_peak;
            self.currents.iter_mut().for_each(|c| *c *= factor);
        }
        self
    }

    pub fn off_time(&self) -> Seconds {
        self.off_time
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn currents(&self) -> &[f64] {
        &self.currents
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl SourceCurrent for PiecewiseLinearSource {
    /// Linear between breakpoints, zero outside them.
    fn eval(&self, t: Seconds) -> Amperes {
        let t = t.0;
        let last = self.times.len() - 1;
        if t < self.times[0] || t > self.times[last] {
            return Amperes::ZERO;
        }

        let idx = self.times.partition_point(|&x| x <= t);
        if idx == 0 {
            return Amperes(self.currents[0]);
        }
        let lo = idx - 1;
        if lo == last || self.times[lo] == t {
            return Amperes(self.currents[lo]);
        }

        let frac = (t - self.times[lo]) / (self.times[lo + 1] - self.times[lo]);
        Amperes(self.currents[lo] + frac * (self.currents[lo + 1] - self.currents[lo]))
    }
}

/// Time the current reaches zero after its last non-zero breakpoint, or the
/// last breakpoint time when it never does.
fn off_time(times: &[f64], currents: &[f64]) -> f64 {
    let last = times.len() - 1;
    match currents.iter().rposition(|&c| c != 0.0) {
        Some(i) if i < last => times[i + 1],
        Some(_) => times[last],
        None => times[0],
    }
}

/// Indices of the samples kept by greedy collinear reduction.
///
/// From each anchor the segment is extended while the slope to the next
/// sample stays inside the interval of slopes that keep every skipped
/// sample within `max_dev`. One pass, linear in the sample count.
fn simplify(t: &[f64], y: &[f64], max_dev: f64) -> Vec<usize> {
    let n = t.len();
    if n <= 2 {
        return (0..n).collect();
    }

    let mut keep = vec![0];
    let mut anchor = 0;
    let mut end = 1;
    let (mut lo, mut hi) = (f64::NEG_INFINITY, f64::INFINITY);

    while end < n - 1 {
        let candidate = end + 1;

        // Skipping `end` narrows the feasible slope interval
        let span = t[end] - t[anchor];
        let next_lo = lo.max((y[end] - max_dev - y[anchor]) / span);
        let next_hi = hi.min((y[end] + max_dev - y[anchor]) / span);
        let slope = (y[candidate] - y[anchor]) / (t[candidate] - t[anchor]);

        if slope >= next_lo && slope <= next_hi {
            lo = next_lo;
            hi = next_hi;
            end = candidate;
        } else {
            keep.push(end);
            anchor = end;
            end = anchor + 1;
            lo = f64::NEG_INFINITY;
            hi = f64::INFINITY;
        }
    }

    keep.push(n - 1);
    keep
}
