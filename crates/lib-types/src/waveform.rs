//! Time-domain TEM waveform representation.
//!
//! A [`Waveform`] holds the transmitter current (or a normalized amplitude)
//! sampled on an explicit, possibly non-uniform, time grid. Generators insert
//! extra nodes at breakpoints, so unlike a fixed-`dt` signal the grid is
//! stored sample by sample.
//!
//! # Sample Semantics
//!
//! `y[i]` is a point value at `t[i]`. Between nodes the waveform is linear;
//! outside `[t_start, t_end]` the source is considered off and
//! [`Waveform::value_at`] returns 0.
//!
//! # Invariants
//!
//! Enforced by [`Waveform::new`], the only constructor:
//! - `t.len() == y.len() >= 2`
//! - `t` strictly increasing
//! - every `t[i]` and `y[i]` finite
//! - `t[0] <= 0 <= t[last]`: the grid includes or brackets the `t = 0`
//!   off-time reference point
//!
//! Fields are private so a constructed waveform can only be read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when samples violate the waveform invariants.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WaveformError {
    #[error("time and amplitude lengths differ: {t_len} vs {y_len}")]
    LengthMismatch { t_len: usize, y_len: usize },

    #[error("waveform needs at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("time grid not strictly increasing at index {index}")]
    NotIncreasing { index: usize },

    #[error("non-finite sample at index {index}")]
    NonFinite { index: usize },

    #[error("time grid [{t_start}, {t_end}] does not include or bracket t = 0")]
    MissingTimeOrigin { t_start: f64, t_end: f64 },
}

/// Supported waveform shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    /// Constant on-time current switched off at `turn_off_time`.
    Step,
    /// Linear rise, flat top, optional abrupt turn-off.
    Ramp,
    /// Alternating-polarity square pulses with off-time gaps.
    BipolarSquare,
    /// Symmetric triangle pulse.
    Triangular,
    /// Half period of a sine.
    HalfSine,
    /// Gaussian bell centred in the pulse width.
    Gaussian,
    /// Linear ramp on, flat top, linear ramp off.
    Trapezoid,
    /// Positive then negative trapezoidal lobes.
    DifferentialPulse,
    /// User-supplied samples.
    Custom,
}

impl WaveformKind {
    /// Every kind, in declaration order.
    pub const ALL: [WaveformKind; 9] = [
        WaveformKind::Step,
        WaveformKind::Ramp,
        WaveformKind::BipolarSquare,
        WaveformKind::Triangular,
        WaveformKind::HalfSine,
        WaveformKind::Gaussian,
        WaveformKind::Trapezoid,
        WaveformKind::DifferentialPulse,
        WaveformKind::Custom,
    ];

    /// Parameter that sets the characteristic duration of the shape.
    ///
    /// Used by width sweeps; `None` for custom samples.
    pub fn width_parameter(&self) -> Option<&'static str> {
        match self {
            Self::Step => Some("turn_off_time"),
            Self::Ramp => Some("rise_time"),
            Self::BipolarSquare => Some("period"),
            Self::Triangular
            | Self::HalfSine
            | Self::Gaussian
            | Self::Trapezoid
            | Self::DifferentialPulse => Some("width"),
            Self::Custom => None,
        }
    }

    /// Canonical snake_case tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Ramp => "ramp",
            Self::BipolarSquare => "bipolar_square",
            Self::Triangular => "triangular",
            Self::HalfSine => "half_sine",
            Self::Gaussian => "gaussian",
            Self::Trapezoid => "trapezoid",
            Self::DifferentialPulse => "differential_pulse",
            Self::Custom => "custom",
        }
    }

    /// Human-readable name used in reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Step => "Step-Off",
            Self::Ramp => "Ramp",
            Self::BipolarSquare => "Bipolar Square Wave",
            Self::Triangular => "Triangle Wave",
            Self::HalfSine => "Half-Sine Wave",
            Self::Gaussian => "Gaussian Pulse",
            Self::Trapezoid => "Trapezoid",
            Self::DifferentialPulse => "Differential Pulse",
            Self::Custom => "Custom Waveform",
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Tag that matches no [`WaveformKind`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown waveform kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for WaveformKind {
    type Err = UnknownKind;

    /// Case-insensitive; `-`, `_` and spaces are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_lowercase() })
            .collect();

        let kind = match norm.as_str() {
            "step" | "step_off" => Self::Step,
            "ramp" => Self::Ramp,
            "bipolar_square" | "bipolar" => Self::BipolarSquare,
            "triangular" | "triangle" => Self::Triangular,
            "half_sine" => Self::HalfSine,
            "gaussian" => Self::Gaussian,
            "trapezoid" => Self::Trapezoid,
            "differential_pulse" | "differential" => Self::DifferentialPulse,
            "custom" | "piecewise" => Self::Custom,
            _ => return Err(UnknownKind(s.to_string())),
        };
        Ok(kind)
    }
}

/// A time-domain waveform sampled on an explicit time grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWaveform")]
pub struct Waveform {
    /// Sample times in seconds.
    t: Vec<f64>,

    /// Amplitude at each sample time.
    y: Vec<f64>,

    /// Shape that produced the samples.
    kind: WaveformKind,

    /// Scalar generation parameters, for provenance.
    parameters: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct RawWaveform {
    t: Vec<f64>,
    y: Vec<f64>,
    kind: WaveformKind,
    #[serde(default)]
    parameters: BTreeMap<String, f64>,
}

impl TryFrom<RawWaveform> for Waveform {
    type Error = WaveformError;

    fn try_from(raw: RawWaveform) -> Result<Self, Self::Error> {
        Waveform::new(raw.t, raw.y, raw.kind, raw.parameters)
    }
}

impl Waveform {
    /// Create a waveform, validating every invariant.
    pub fn new(
        t: Vec<f64>,
        y: Vec<f64>,
        kind: WaveformKind,
        parameters: BTreeMap<String, f64>,
    ) -> Result<Self, WaveformError> {
        if t.len() != y.len() {
            return Err(WaveformError::LengthMismatch { t_len: t.len(), y_len: y.len() });
        }
        if t.len() < 2 {
            return Err(WaveformError::TooFewSamples(t.len()));
        }
        if let Some(index) = t.iter().zip(&y).position(|(a, b)| !a.is_finite() || !b.is_finite()) {
            return Err(WaveformError::NonFinite { index });
        }
        if let Some(index) = t.windows(2).position(|w| w[1] <= w[0]) {
            return Err(WaveformError::NotIncreasing { index: index + 1 });
        }

        let (t_start, t_end) = (t[0], t[t.len() - 1]);
        if t_start > 0.0 || t_end < 0.0 {
            return Err(WaveformError::MissingTimeOrigin { t_start, t_end });
        }

        Ok(Self { t, y, kind, parameters })
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Always false for a validated waveform; present for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Sample times (seconds).
    #[inline]
    pub fn t(&self) -> &[f64] {
        &self.t
    }

    /// Sample amplitudes.
    #[inline]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    #[inline]
    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// Generation parameters recorded at construction.
    #[inline]
    pub fn parameters(&self) -> &BTreeMap<String, f64> {
        &self.parameters
    }

    /// Look up a single generation parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Iterate `(t, y)` pairs.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.t.iter().copied().zip(self.y.iter().copied())
    }

    /// Time of the first sample.
    #[inline]
    pub fn t_start(&self) -> f64 {
        self.t[0]
    }

    /// Time of the last sample.
    #[inline]
    pub fn t_end(&self) -> f64 {
        self.t[self.t.len() - 1]
    }

    /// Duration covered by the samples.
    #[inline]
    pub fn span(&self) -> f64 {
        self.t_end() - self.t_start()
    }

    /// Interpolate the waveform at an arbitrary time.
    ///
    /// Exact at sample nodes, linear in between, zero outside the span.
    pub fn value_at(&self, t: f64) -> f64 {
        if t < self.t_start() || t > self.t_end() {
            return 0.0;
        }

        let upper = self.t.partition_point(|&x| x <= t);
        let idx = upper - 1;
        if self.t[idx] == t || idx + 1 >= self.t.len() {
            return self.y[idx];
        }

        let (t0, t1) = (self.t[idx], self.t[idx + 1]);
        let frac = (t - t0) / (t1 - t0);
        self.y[idx] * (1.0 - frac) + self.y[idx + 1] * frac
    }

    /// Whether samples sit on a uniform grid.
    pub fn is_uniform(&self, rel_tol: f64) -> bool {
        crate::grid::is_uniform(&self.t, rel_tol)
    }

    /// Maximum absolute amplitude.
    pub fn peak_abs(&self) -> f64 {
        self.y.iter().map(|v| v.abs()).fold(0.0, f64::max)
    }

    /// Peak-to-peak amplitude.
    pub fn peak_to_peak(&self) -> f64 {
        let (min, max) = self
            .y
            .iter()
            .fold((f64::MAX, f64::MIN), |(min, max), &v| (min.min(v), max.max(v)));
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Waveform {
        Waveform::new(
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0, 0.0],
            WaveformKind::Triangular,
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_waveform_basics() {
        let wf = ramp();
        assert_eq!(wf.len(), 3);
        assert_eq!(wf.kind(), WaveformKind::Triangular);
        assert!((wf.span() - 2.0).abs() < 1e-12);
        assert!((wf.peak_to_peak() - 1.0).abs() < 1e-12);
        assert!(wf.is_uniform(1e-9));
    }

    #[test]
    fn test_waveform_interpolation() {
        let wf = ramp();
        assert!((wf.value_at(0.5) - 0.5).abs() < 1e-12);
        assert!((wf.value_at(1.5) - 0.5).abs() < 1e-12);
        assert_eq!(wf.value_at(1.0), 1.0);
        assert_eq!(wf.value_at(2.0), 0.0);
        assert_eq!(wf.value_at(-0.1), 0.0);
        assert_eq!(wf.value_at(3.0), 0.0);
    }

    #[test]
    fn test_rejects_invalid_samples() {
        let kind = WaveformKind::Custom;
        assert_eq!(
            Waveform::new(vec![0.0, 1.0], vec![0.0], kind, BTreeMap::new()),
            Err(WaveformError::LengthMismatch { t_len: 2, y_len: 1 })
        );
        assert_eq!(
            Waveform::new(vec![0.0], vec![0.0], kind, BTreeMap::new()),
            Err(WaveformError::TooFewSamples(1))
        );
        assert_eq!(
            Waveform::new(vec![0.0, 1.0, 1.0], vec![0.0; 3], kind, BTreeMap::new()),
            Err(WaveformError::NotIncreasing { index: 2 })
        );
        assert_eq!(
            Waveform::new(vec![0.0, 1.0], vec![0.0, f64::NAN], kind, BTreeMap::new()),
            Err(WaveformError::NonFinite { index: 1 })
        );
        assert!(matches!(
            Waveform::new(vec![0.5, 1.0], vec![0.0, 1.0], kind, BTreeMap::new()),
            Err(WaveformError::MissingTimeOrigin { .. })
        ));
    }

    #[test]
    fn test_negative_start_brackets_origin() {
        let wf = Waveform::new(
            vec![-1.0, 0.5],
            vec![1.0, 1.0],
            WaveformKind::Custom,
            BTreeMap::new(),
        );
        assert!(wf.is_ok());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Half-Sine".parse::<WaveformKind>(), Ok(WaveformKind::HalfSine));
        assert_eq!("step_off".parse::<WaveformKind>(), Ok(WaveformKind::Step));
        assert_eq!("BIPOLAR".parse::<WaveformKind>(), Ok(WaveformKind::BipolarSquare));
        assert!("sawtooth".parse::<WaveformKind>().is_err());

        for kind in WaveformKind::ALL {
            assert_eq!(kind.tag().parse::<WaveformKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok = r#"{"t":[0.0,1.0],"y":[1.0,0.0],"kind":"step"}"#;
        let wf: Waveform = serde_json::from_str(ok).unwrap();
        assert_eq!(wf.kind(), WaveformKind::Step);

        let bad = r#"{"t":[1.0,0.0],"y":[1.0,0.0],"kind":"step"}"#;
        assert!(serde_json::from_str::<Waveform>(bad).is_err());
    }
}
