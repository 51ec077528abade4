//! TEM transmitter waveform generation.
//!
//! Each built-in shape is described as a short list of [`Segment`]s
//! (constant, linear, half-sine or Gaussian pieces) and then sampled on a
//! uniform grid of `n_samples` nodes over `[0, t_max]`. Segment boundaries
//! are pinned into the grid so switching instants are represented exactly:
//!
//! - a slope change at `t_b` inserts the node `t_b`
//! - a jump at `t_b` inserts `t_b` (right-hand value) and the guard node
//!   `t_b - delta` (left-hand value), `delta = dt * edge_fraction`
//!
//! Uniform nodes closer than `delta / 2` to a pinned node are dropped so the
//! time grid stays strictly increasing.
//!
//! # Example
//!
//! ```ignore
//! use lib_dsp::generator::{WaveformGenerator, WaveformSpec};
//!
//! let generator = WaveformGenerator::default();
//! let step = generator.build(&WaveformSpec::step(0.01))?;
//! assert_eq!(step.value_at(0.005), 1.0);
//! ```

use crate::error::{GeneratorError, GeneratorResult};
use crate::params::{ParamReader, Parameters};
use lib_types::grid::{grid_step, linspace};
use lib_types::{Waveform, WaveformKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Generator-wide defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Transition time of differential pulse edges (seconds).
    pub time_delay: f64,

    /// Fraction of the width each differential pulse lobe holds flat.
    pub pulse_ratio: f64,

    /// Uniform grid density when a request does not set `n_samples`.
    pub n_samples: usize,

    /// Guard node offset before a jump, as a fraction of the grid step.
    pub edge_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            time_delay: 1e-5,
            pulse_ratio: 0.5,
            n_samples: 2001,
            edge_fraction: 1e-3,
        }
    }
}

/// Typed shape parameters, one variant per [`WaveformKind`].
///
/// Optional fields fall back to the documented defaults when the waveform
/// is built.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Step {
        amplitude: f64,
        turn_off_time: f64,
        t_max: Option<f64>,
    },
    Ramp {
        amplitude: f64,
        rise_time: f64,
        t_max: f64,
        turn_off_time: Option<f64>,
    },
    BipolarSquare {
        amplitude: f64,
        period: f64,
        duty_cycle: f64,
        cycles: usize,
        t_max: Option<f64>,
    },
    Triangular {
        amplitude: f64,
        width: f64,
        t_max: Option<f64>,
    },
    HalfSine {
        amplitude: f64,
        width: f64,
        t_max: Option<f64>,
    },
    Gaussian {
        amplitude: f64,
        width: f64,
        t_max: Option<f64>,
    },
    Trapezoid {
        amplitude: f64,
        width: f64,
        rise_time: f64,
        fall_time: Option<f64>,
        t_max: Option<f64>,
    },
    DifferentialPulse {
        amplitude: f64,
        width: f64,
        time_delay: Option<f64>,
        pulse_ratio: Option<f64>,
        t_max: Option<f64>,
    },
    Custom {
        t: Vec<f64>,
        y: Vec<f64>,
    },
}

impl Shape {
    /// Kind this shape generates.
    pub fn kind(&self) -> WaveformKind {
        match self {
            Shape::Step { .. } => WaveformKind::Step,
            Shape::Ramp { .. } => WaveformKind::Ramp,
            Shape::BipolarSquare { .. } => WaveformKind::BipolarSquare,
            Shape::Triangular { .. } => WaveformKind::Triangular,
            Shape::HalfSine { .. } => WaveformKind::HalfSine,
            Shape::Gaussian { .. } => WaveformKind::Gaussian,
            Shape::Trapezoid { .. } => WaveformKind::Trapezoid,
            Shape::DifferentialPulse { .. } => WaveformKind::DifferentialPulse,
            Shape::Custom { .. } => WaveformKind::Custom,
        }
    }
}

/// A fully typed generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformSpec {
    pub shape: Shape,

    /// Grid density; `None` uses [`GeneratorConfig::n_samples`].
    pub n_samples: Option<usize>,
}

impl WaveformSpec {
    fn of(shape: Shape) -> Self {
        Self { shape, n_samples: None }
    }

    /// Unit step switched off at `turn_off_time`.
    pub fn step(turn_off_time: f64) -> Self {
        Self::of(Shape::Step { amplitude: 1.0, turn_off_time, t_max: None })
    }

    /// Linear rise over `rise_time`, held until `t_max`.
    pub fn ramp(rise_time: f64, t_max: f64) -> Self {
        Self::of(Shape::Ramp { amplitude: 1.0, rise_time, t_max, turn_off_time: None })
    }

    /// One cycle of a bipolar square train.
    pub fn bipolar_square(period: f64, duty_cycle: f64) -> Self {
        Self::of(Shape::BipolarSquare {
            amplitude: 1.0,
            period,
            duty_cycle,
            cycles: 1,
            t_max: None,
        })
    }

    pub fn triangular(width: f64) -> Self {
        Self::of(Shape::Triangular { amplitude: 1.0, width, t_max: None })
    }

    pub fn half_sine(width: f64) -> Self {
        Self::of(Shape::HalfSine { amplitude: 1.0, width, t_max: None })
    }

    pub fn gaussian(width: f64) -> Self {
        Self::of(Shape::Gaussian { amplitude: 1.0, width, t_max: None })
    }

    /// Symmetric trapezoid (`fall_time = rise_time`).
    pub fn trapezoid(width: f64, rise_time: f64) -> Self {
        Self::of(Shape::Trapezoid {
            amplitude: 1.0,
            width,
            rise_time,
            fall_time: None,
            t_max: None,
        })
    }

    /// Differential pulse using the generator's `time_delay`/`pulse_ratio`.
    pub fn differential_pulse(width: f64) -> Self {
        Self::of(Shape::DifferentialPulse {
            amplitude: 1.0,
            width,
            time_delay: None,
            pulse_ratio: None,
            t_max: None,
        })
    }

    pub fn custom(t: Vec<f64>, y: Vec<f64>) -> Self {
        Self::of(Shape::Custom { t, y })
    }

    /// Override the grid density.
    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = Some(n_samples);
        self
    }

    /// Override the amplitude (ignored for custom samples).
    pub fn with_amplitude(mut self, value: f64) -> Self {
        match &mut self.shape {
            Shape::Step { amplitude, .. }
            | Shape::Ramp { amplitude, .. }
            | Shape::BipolarSquare { amplitude, .. }
            | Shape::Triangular { amplitude, .. }
            | Shape::HalfSine { amplitude, .. }
            | Shape::Gaussian { amplitude, .. }
            | Shape::Trapezoid { amplitude, .. }
            | Shape::DifferentialPulse { amplitude, .. } => *amplitude = value,
            Shape::Custom { .. } => {}
        }
        self
    }

    /// Override the record length (ramps always carry one).
    pub fn with_t_max(mut self, value: f64) -> Self {
        match &mut self.shape {
            Shape::Ramp { t_max, .. } => *t_max = value,
            Shape::Step { t_max, .. }
            | Shape::BipolarSquare { t_max, .. }
            | Shape::Triangular { t_max, .. }
            | Shape::HalfSine { t_max, .. }
            | Shape::Gaussian { t_max, .. }
            | Shape::Trapezoid { t_max, .. }
            | Shape::DifferentialPulse { t_max, .. } => *t_max = Some(value),
            Shape::Custom { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> WaveformKind {
        self.shape.kind()
    }

    /// Lift a loosely typed parameter map into a spec for `kind`.
    ///
    /// Only presence, value shape and finiteness are checked here; range
    /// checks happen in [`WaveformGenerator::build`].
    pub fn from_parameters(kind: WaveformKind, params: &Parameters) -> GeneratorResult<Self> {
        let mut r = ParamReader::new(kind, params);

        let shape = match kind {
            WaveformKind::Step => Shape::Step {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                turn_off_time: r.required("turn_off_time")?,
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::Ramp => Shape::Ramp {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                rise_time: r.required("rise_time")?,
                t_max: r.required("t_max")?,
                turn_off_time: r.scalar("turn_off_time")?,
            },
            WaveformKind::BipolarSquare => Shape::BipolarSquare {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                period: r.required("period")?,
                duty_cycle: r.required("duty_cycle")?,
                cycles: r.count("cycles")?.unwrap_or(1),
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::Triangular => Shape::Triangular {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                width: r.required("width")?,
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::HalfSine => Shape::HalfSine {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                width: r.required("width")?,
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::Gaussian => Shape::Gaussian {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                width: r.required("width")?,
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::Trapezoid => Shape::Trapezoid {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                width: r.required("width")?,
                rise_time: r.required("rise_time")?,
                fall_time: r.scalar("fall_time")?,
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::DifferentialPulse => Shape::DifferentialPulse {
                amplitude: r.scalar("amplitude")?.unwrap_or(1.0),
                width: r.required("width")?,
                time_delay: r.scalar("time_delay")?,
                pulse_ratio: r.scalar("pulse_ratio")?,
                t_max: r.scalar("t_max")?,
            },
            WaveformKind::Custom => Shape::Custom {
                t: r.series("t")?,
                y: r.series("y")?,
            },
        };

        let n_samples = r.count("n_samples")?;
        r.finish();

        Ok(Self { shape, n_samples })
    }
}

/// Closed-form piece of a waveform between two boundaries.
#[derive(Clone, Copy, Debug)]
enum Piece {
    Constant(f64),
    Linear { from: f64, to: f64 },
    HalfSine { amplitude: f64 },
    Gaussian { amplitude: f64, center: f64, sigma: f64 },
}

/// `piece` on `[start, end)`. `end` may be infinite for held levels.
#[derive(Clone, Copy, Debug)]
struct Segment {
    start: f64,
    end: f64,
    piece: Piece,
}

impl Segment {
    fn new(start: f64, end: f64, piece: Piece) -> Self {
        Self { start, end, piece }
    }

    fn eval(&self, t: f64) -> f64 {
        match self.piece {
            Piece::Constant(v) => v,
            Piece::Linear { from, to } => {
                from + (to - from) * (t - self.start) / (self.end - self.start)
            }
            Piece::HalfSine { amplitude } => {
                amplitude * (PI * (t - self.start) / (self.end - self.start)).sin()
            }
            Piece::Gaussian { amplitude, center, sigma } => {
                amplitude * (-(t - center).powi(2) / (2.0 * sigma * sigma)).exp()
            }
        }
    }
}

/// Segments of one shape plus its resolved record length and parameters.
struct Profile {
    segments: Vec<Segment>,
    t_max: f64,
    resolved: BTreeMap<String, f64>,
}

impl Profile {
    fn new(t_max: f64) -> Self {
        Self {
            segments: Vec::new(),
            t_max,
            resolved: BTreeMap::new(),
        }
    }

    /// Append a segment; empty intervals are skipped.
    fn push(&mut self, start: f64, end: f64, piece: Piece) {
        if end > start {
            self.segments.push(Segment::new(start, end, piece));
        }
    }

    fn record(&mut self, name: &str, value: f64) {
        self.resolved.insert(name.to_string(), value);
    }

    /// Right-continuous value; zero outside every segment.
    fn value(&self, t: f64) -> f64 {
        let idx = self.segments.partition_point(|s| s.start <= t);
        match idx.checked_sub(1).map(|i| &self.segments[i]) {
            Some(seg) if t < seg.end => seg.eval(t),
            _ => 0.0,
        }
    }

    /// Limit of the value approaching `t` from the left.
    fn left_limit(&self, t: f64) -> f64 {
        let idx = self.segments.partition_point(|s| s.start < t);
        match idx.checked_sub(1).map(|i| &self.segments[i]) {
            Some(seg) if t <= seg.end => seg.eval(t),
            _ => 0.0,
        }
    }

    /// Segment boundaries inside `[0, t_max]`, ascending.
    fn boundaries(&self) -> Vec<f64> {
        let mut points: Vec<f64> = self
            .segments
            .iter()
            .flat_map(|s| [s.start, s.end])
            .filter(|&b| b.is_finite() && (0.0..=self.t_max).contains(&b))
            .collect();
        points.sort_by(f64::total_cmp);
        points.dedup();
        points
    }

    /// Shortest finite segment, for grid coarseness warnings.
    fn shortest_segment(&self) -> Option<f64> {
        self.segments
            .iter()
            .filter(|s| s.end.is_finite())
            .map(|s| s.end - s.start)
            .min_by(f64::total_cmp)
    }
}

/// Builds [`Waveform`]s from kind tags, parameter maps or typed specs.
#[derive(Clone, Debug, Default)]
pub struct WaveformGenerator {
    config: GeneratorConfig,
}

impl WaveformGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a waveform from a kind tag and named parameters.
    pub fn generate(&self, kind: &str, params: &Parameters) -> GeneratorResult<Waveform> {
        let kind: WaveformKind = kind
            .parse()
            .map_err(|_| GeneratorError::UnsupportedWaveformType(kind.to_string()))?;
        self.generate_kind(kind, params)
    }

    /// Generate a waveform of an already parsed kind.
    pub fn generate_kind(
        &self,
        kind: WaveformKind,
        params: &Parameters,
    ) -> GeneratorResult<Waveform> {
        let spec = WaveformSpec::from_parameters(kind, params)?;
        self.build(&spec)
    }

    /// Build a waveform from a typed spec, validating every range.
    pub fn build(&self, spec: &WaveformSpec) -> GeneratorResult<Waveform> {
        let kind = spec.kind();

        if let Shape::Custom { t, y } = &spec.shape {
            return custom_waveform(t.clone(), y.clone(), BTreeMap::new());
        }

        let n_samples = spec.n_samples.unwrap_or(self.config.n_samples);
        if n_samples < 2 {
            return Err(GeneratorError::DegenerateWaveform {
                kind: kind.to_string(),
                distinct: n_samples,
            });
        }
        let ef = self.config.edge_fraction;
        if !(ef > 0.0 && ef < 0.5) {
            return Err(GeneratorError::invalid(
                kind,
                "edge_fraction",
                format!("must be in (0, 0.5), got {}", ef),
            ));
        }

        let mut profile = self.profile(&spec.shape)?;
        profile.record("n_samples", n_samples as f64);

        let dt = grid_step(profile.t_max, n_samples);
        if let Some(shortest) = profile.shortest_segment() {
            if shortest < dt {
                tracing::warn!(
                    "{} grid step {:.3e} s is coarser than its shortest segment {:.3e} s",
                    kind,
                    dt,
                    shortest
                );
            }
        }

        let t = pinned_grid(&profile, n_samples, dt * ef);
        let y: Vec<f64> = t.iter().map(|&ti| profile.value(ti)).collect();

        tracing::debug!(
            "Generated {} waveform: {} samples over [0, {:.6e}] s ({} pinned)",
            kind,
            t.len(),
            profile.t_max,
            t.len().saturating_sub(n_samples)
        );

        Waveform::new(t, y, kind, profile.resolved)
            .map_err(|e| GeneratorError::from_waveform(kind, e))
    }

    /// Build a custom waveform by evaluating `f` on the times `t`.
    pub fn sample_fn<F>(&self, t: Vec<f64>, f: F) -> GeneratorResult<Waveform>
    where
        F: Fn(f64) -> f64,
    {
        let y = t.iter().map(|&ti| f(ti)).collect();
        custom_waveform(t, y, BTreeMap::new())
    }

    fn profile(&self, shape: &Shape) -> GeneratorResult<Profile> {
        let kind = shape.kind();
        let positive = |name: &str, v: f64| -> GeneratorResult<f64> {
            if v > 0.0 {
                Ok(v)
            } else {
                Err(GeneratorError::invalid(kind, name, format!("must be > 0, got {}", v)))
            }
        };
        let record_len = |default: f64, t_max: Option<f64>| -> GeneratorResult<f64> {
            match t_max {
                Some(v) => positive("t_max", v),
                None => Ok(default),
            }
        };

        let (amplitude, mut profile) = match *shape {
            Shape::Step { amplitude, turn_off_time, t_max } => {
                let t_off = positive("turn_off_time", turn_off_time)?;
                let t_max = record_len(2.0 * t_off, t_max)?;
                if t_max <= t_off {
                    return Err(GeneratorError::invalid(
                        kind,
                        "t_max",
                        format!("must exceed turn_off_time {}, got {}", t_off, t_max),
                    ));
                }
                let mut p = Profile::new(t_max);
                p.push(0.0, t_off, Piece::Constant(amplitude));
                p.record("turn_off_time", t_off);
                (amplitude, p)
            }

            Shape::Ramp { amplitude, rise_time, t_max, turn_off_time } => {
                let rise = positive("rise_time", rise_time)?;
                if t_max <= rise {
                    return Err(GeneratorError::invalid(
                        kind,
                        "t_max",
                        format!("must exceed rise_time {}, got {}", rise, t_max),
                    ));
                }
                let mut p = Profile::new(t_max);
                p.push(0.0, rise, Piece::Linear { from: 0.0, to: amplitude });
                match turn_off_time {
                    Some(t_off) if t_off < rise || t_off > t_max => {
                        return Err(GeneratorError::invalid(
                            kind,
                            "turn_off_time",
                            format!("must lie in [{}, {}], got {}", rise, t_max, t_off),
                        ));
                    }
                    Some(t_off) => {
                        p.push(rise, t_off, Piece::Constant(amplitude));
                        p.record("turn_off_time", t_off);
                    }
                    None => p.push(rise, f64::INFINITY, Piece::Constant(amplitude)),
                }
                p.record("rise_time", rise);
                (amplitude, p)
            }

            Shape::BipolarSquare { amplitude, period, duty_cycle, cycles, t_max } => {
                let period = positive("period", period)?;
                if !(duty_cycle > 0.0 && duty_cycle <= 1.0) {
                    return Err(GeneratorError::invalid(
                        kind,
                        "duty_cycle",
                        format!("must be in (0, 1], got {}", duty_cycle),
                    ));
                }
                if cycles == 0 {
                    return Err(GeneratorError::invalid(kind, "cycles", "must be >= 1"));
                }

                let t_max = record_len(cycles as f64 * period, t_max)?;
                let mut p = Profile::new(t_max);
                let half = period / 2.0;
                let on = duty_cycle * half;
                for k in 0..cycles {
                    let start = k as f64 * period;
                    let mid = start + half;
                    let next = (k + 1) as f64 * period;
                    let (pos_end, neg_end) =
                        if on >= half { (mid, next) } else { (start + on, mid + on) };
                    p.push(start, pos_end, Piece::Constant(amplitude));
                    p.push(mid, neg_end, Piece::Constant(-amplitude));
                }
                p.record("period", period);
                p.record("duty_cycle", duty_cycle);
                p.record("cycles", cycles as f64);
                (amplitude, p)
            }

            Shape::Triangular { amplitude, width, t_max } => {
                let width = positive("width", width)?;
                let mut p = Profile::new(record_len(2.0 * width, t_max)?);
                let apex = width / 2.0;
                p.push(0.0, apex, Piece::Linear { from: 0.0, to: amplitude });
                p.push(apex, width, Piece::Linear { from: amplitude, to: 0.0 });
                p.record("width", width);
                (amplitude, p)
            }

            Shape::HalfSine { amplitude, width, t_max } => {
                let width = positive("width", width)?;
                let mut p = Profile::new(record_len(2.0 * width, t_max)?);
                p.push(0.0, width, Piece::HalfSine { amplitude });
                p.record("width", width);
                (amplitude, p)
            }

            Shape::Gaussian { amplitude, width, t_max } => {
                let width = positive("width", width)?;
                let mut p = Profile::new(record_len(2.0 * width, t_max)?);
                p.push(
                    0.0,
                    f64::INFINITY,
                    Piece::Gaussian { amplitude, center: width / 2.0, sigma: width / 6.0 },
                );
                p.record("width", width);
                (amplitude, p)
            }

            Shape::Trapezoid { amplitude, width, rise_time, fall_time, t_max } => {
                let width = positive("width", width)?;
                let rise = positive("rise_time", rise_time)?;
                let fall = positive("fall_time", fall_time.unwrap_or(rise))?;
                if rise + fall > width {
                    return Err(GeneratorError::invalid(
                        kind,
                        "rise_time",
                        format!("rise_time + fall_time ({}) exceeds width {}", rise + fall, width),
                    ));
                }
                let mut p = Profile::new(record_len(2.0 * width, t_max)?);
                let fall_start = width - fall;
                p.push(0.0, rise, Piece::Linear { from: 0.0, to: amplitude });
                p.push(rise, fall_start, Piece::Constant(amplitude));
                p.push(fall_start, width, Piece::Linear { from: amplitude, to: 0.0 });
                p.record("width", width);
                p.record("rise_time", rise);
                p.record("fall_time", fall);
                (amplitude, p)
            }

            Shape::DifferentialPulse { amplitude, width, time_delay, pulse_ratio, t_max } => {
                let width = positive("width", width)?;
                let td = positive("time_delay", time_delay.unwrap_or(self.config.time_delay))?;
                let ratio = pulse_ratio.unwrap_or(self.config.pulse_ratio);
                if !(ratio > 0.0 && ratio <= 1.0) {
                    return Err(GeneratorError::invalid(
                        kind,
                        "pulse_ratio",
                        format!("must be in (0, 1], got {}", ratio),
                    ));
                }

                let hold = width * ratio;
                let t2 = td;
                let t3 = t2 + hold;
                let t4 = t3 + 2.0 * td;
                let t5 = t4 + hold;
                let t6 = t5 + td;

                let mut p = Profile::new(record_len(2.0 * t6, t_max)?);
                p.push(0.0, t2, Piece::Linear { from: 0.0, to: amplitude });
                p.push(t2, t3, Piece::Constant(amplitude));
                p.push(t3, t4, Piece::Linear { from: amplitude, to: -amplitude });
                p.push(t4, t5, Piece::Constant(-amplitude));
                p.push(t5, t6, Piece::Linear { from: -amplitude, to: 0.0 });
                p.record("width", width);
                p.record("time_delay", td);
                p.record("pulse_ratio", ratio);
                (amplitude, p)
            }

            Shape::Custom { .. } => {
                return Err(GeneratorError::invalid(
                    kind,
                    "t",
                    "custom samples have no closed form",
                ));
            }
        };

        profile.record("amplitude", amplitude);
        let t_max = profile.t_max;
        profile.record("t_max", t_max);
        Ok(profile)
    }
}

/// Validate user samples, reporting too few distinct times as degenerate.
fn custom_waveform(
    t: Vec<f64>,
    y: Vec<f64>,
    parameters: BTreeMap<String, f64>,
) -> GeneratorResult<Waveform> {
    let kind = WaveformKind::Custom;

    let mut distinct = t.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(GeneratorError::DegenerateWaveform {
            kind: kind.to_string(),
            distinct: distinct.len(),
        });
    }

    Waveform::new(t, y, kind, parameters).map_err(|e| GeneratorError::from_waveform(kind, e))
}

/// Uniform grid over `[0, t_max]` merged with the profile's boundaries.
fn pinned_grid(profile: &Profile, n_samples: usize, delta: f64) -> Vec<f64> {
    let mut pinned = Vec::new();
    for b in profile.boundaries() {
        let jump = (profile.left_limit(b) - profile.value(b)).abs();
        let scale = profile.value(b).abs().max(profile.left_limit(b).abs()).max(1.0);
        if b > 0.0 && jump > 1e-12 * scale && b - delta > 0.0 {
            pinned.push(b - delta);
        }
        pinned.push(b);
    }
    pinned.sort_by(f64::total_cmp);
    pinned.dedup_by(|a, b| (*a - *b).abs() < 0.25 * delta);

    let near_pinned = |u: f64| {
        let idx = pinned.partition_point(|&p| p < u);
        let below = idx.checked_sub(1).map(|i| u - pinned[i]);
        let above = pinned.get(idx).map(|p| p - u);
        below.into_iter().chain(above).any(|d| d < 0.5 * delta)
    };

    let mut grid: Vec<f64> = linspace(0.0, profile.t_max, n_samples)
        .into_iter()
        .filter(|&u| !near_pinned(u))
        .collect();
    grid.extend_from_slice(&pinned);
    grid.sort_by(f64::total_cmp);
    grid.dedup();
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{scalar_params, ParamValue};

    fn generator() -> WaveformGenerator {
        WaveformGenerator::default()
    }

    fn assert_valid(wf: &Waveform) {
        assert!(wf.len() >= 2);
        assert_eq!(wf.t().len(), wf.y().len());
        assert!(wf.t().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_step_breakpoint_exactness() {
        let params = scalar_params([("amplitude", 1.0), ("turn_off_time", 0.01)]);
        let wf = generator().generate("step", &params).unwrap();
        assert_valid(&wf);

        for (t, y) in wf.samples() {
            if t < 0.01 {
                assert_eq!(y, 1.0, "t = {}", t);
            } else {
                assert_eq!(y, 0.0, "t = {}", t);
            }
        }
        assert!(wf.t().contains(&0.01));
        assert!(wf.t().iter().any(|&t| t < 0.01 && t > 0.01 - 1e-7));
        assert_eq!(wf.parameter("t_max"), Some(0.02));
    }

    #[test]
    fn test_every_builtin_kind_is_valid() {
        let specs = [
            WaveformSpec::step(0.01),
            WaveformSpec::ramp(0.002, 0.01),
            WaveformSpec::bipolar_square(0.02, 0.5),
            WaveformSpec::triangular(0.005),
            WaveformSpec::half_sine(0.005),
            WaveformSpec::gaussian(0.005),
            WaveformSpec::trapezoid(0.005, 0.001),
            WaveformSpec::differential_pulse(0.005),
        ];

        for spec in &specs {
            let wf = generator().build(spec).unwrap();
            assert_valid(&wf);
            assert_eq!(wf.kind(), spec.kind());
            assert_eq!(wf.t_start(), 0.0);
        }
    }

    #[test]
    fn test_ramp_values() {
        let spec = WaveformSpec::ramp(0.002, 0.01).with_amplitude(2.0);
        let wf = generator().build(&spec).unwrap();

        assert!((wf.value_at(0.001) - 1.0).abs() < 1e-9);
        assert_eq!(wf.value_at(0.002), 2.0);
        assert_eq!(wf.y()[wf.len() - 1], 2.0);
    }

    #[test]
    fn test_ramp_turn_off() {
        let params =
            scalar_params([("rise_time", 0.002), ("t_max", 0.01), ("turn_off_time", 0.005)]);
        let wf = generator().generate("ramp", &params).unwrap();
        assert_eq!(wf.value_at(0.004), 1.0);
        assert_eq!(wf.value_at(0.005), 0.0);

        let params =
            scalar_params([("rise_time", 0.002), ("t_max", 0.01), ("turn_off_time", 0.02)]);
        let err = generator().generate("ramp", &params).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::InvalidParameters { ref parameter, .. } if parameter == "turn_off_time"
        ));
    }

    #[test]
    fn test_bipolar_polarity() {
        let wf = generator().build(&WaveformSpec::bipolar_square(0.02, 0.5)).unwrap();

        // +A on [0, 5ms), off, -A on [10ms, 15ms), off
        assert_eq!(wf.value_at(0.002), 1.0);
        assert_eq!(wf.value_at(0.007), 0.0);
        assert_eq!(wf.value_at(0.012), -1.0);
        assert_eq!(wf.value_at(0.017), 0.0);
        assert_eq!(wf.value_at(0.005), 0.0);
        assert_eq!(wf.value_at(0.010), -1.0);
    }

    #[test]
    fn test_bipolar_full_duty_has_no_gap() {
        let wf = generator().build(&WaveformSpec::bipolar_square(0.02, 1.0)).unwrap();
        assert_eq!(wf.value_at(0.0099), 1.0);
        assert_eq!(wf.value_at(0.0101), -1.0);
        assert_eq!(wf.value_at(0.0199), -1.0);
    }

    #[test]
    fn test_differential_pulse_breakpoints() {
        let wf = generator().build(&WaveformSpec::differential_pulse(0.001)).unwrap();

        // td = 10 us, hold = 500 us
        let (t3, t4) = (0.00051, 0.00053);
        assert!(wf.t().iter().any(|&t| (t - t3).abs() < 1e-15));
        assert_eq!(wf.value_at(0.0003), 1.0);
        assert!(wf.value_at(0.00052).abs() < 1e-9);
        assert_eq!(wf.value_at(t4 + 1e-4), -1.0);
        assert_eq!(wf.y()[wf.len() - 1], 0.0);
        assert_eq!(wf.parameter("pulse_ratio"), Some(0.5));
    }

    #[test]
    fn test_gaussian_and_half_sine_peak() {
        let wf = generator().build(&WaveformSpec::gaussian(0.006)).unwrap();
        assert!((wf.value_at(0.003) - 1.0).abs() < 1e-4);

        let wf = generator().build(&WaveformSpec::half_sine(0.006).with_amplitude(3.0)).unwrap();
        assert!((wf.peak_abs() - 3.0).abs() < 1e-4);
        assert_eq!(wf.value_at(0.009), 0.0);
    }

    #[test]
    fn test_trapezoid_rejects_overlong_edges() {
        let params = scalar_params([("width", 0.004), ("rise_time", 0.002), ("fall_time", 0.003)]);
        let err = generator().generate("trapezoid", &params).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameters { .. }));
    }

    #[test]
    fn test_unsupported_kind() {
        let err = generator().generate("sawtooth", &Parameters::new()).unwrap_err();
        assert_eq!(err, GeneratorError::UnsupportedWaveformType("sawtooth".into()));
    }

    #[test]
    fn test_missing_and_out_of_range_parameters() {
        let err = generator().generate("step", &Parameters::new()).unwrap_err();
        assert!(err.to_string().contains("turn_off_time"));

        let params = scalar_params([("turn_off_time", -1.0)]);
        assert!(generator().generate("step", &params).is_err());

        let params = scalar_params([("turn_off_time", 0.01), ("t_max", 0.005)]);
        let err = generator().generate("step", &params).unwrap_err();
        assert!(err.to_string().contains("t_max"));

        let params = scalar_params([("period", 0.02), ("duty_cycle", 1.5)]);
        assert!(generator().generate("bipolar", &params).is_err());
    }

    #[test]
    fn test_degenerate_grid() {
        let spec = WaveformSpec::step(0.01).with_n_samples(1);
        let err = generator().build(&spec).unwrap_err();
        assert_eq!(err, GeneratorError::DegenerateWaveform { kind: "step".into(), distinct: 1 });
    }

    #[test]
    fn test_custom_waveform() {
        let mut params = Parameters::new();
        params.insert("t".into(), ParamValue::Series(vec![0.0, 0.001, 0.002]));
        params.insert("y".into(), ParamValue::Series(vec![1.0, 1.0, 0.0]));
        let wf = generator().generate("custom", &params).unwrap();
        assert_eq!(wf.len(), 3);
        assert_eq!(wf.kind(), WaveformKind::Custom);

        let err = generator()
            .build(&WaveformSpec::custom(vec![0.0, 0.0], vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, GeneratorError::DegenerateWaveform { distinct: 1, .. }));

        let err = generator()
            .build(&WaveformSpec::custom(vec![0.0, 0.002, 0.001], vec![1.0, 1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::InvalidParameters { ref parameter, .. } if parameter == "t"
        ));
    }

    #[test]
    fn test_sample_fn() {
        let t = linspace(0.0, 1e-3, 101);
        let wf = generator()
            .sample_fn(t, |x| (-x / 1e-4).exp())
            .unwrap();
        assert_eq!(wf.kind(), WaveformKind::Custom);
        assert_eq!(wf.y()[0], 1.0);
        assert!(wf.y()[100] < 1e-4);
    }

    #[test]
    fn test_config_defaults() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"pulse_ratio": 0.25}"#).unwrap();
        assert_eq!(config.pulse_ratio, 0.25);
        assert_eq!(config.time_delay, 1e-5);
        assert_eq!(config.n_samples, 2001);
    }
}
