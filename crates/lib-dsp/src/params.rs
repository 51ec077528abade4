//! Named generation parameters.
//!
//! Parameters arrive as a loosely typed map (from TOML/JSON or CLI flags) and
//! are lifted into a typed [`crate::generator::Shape`] by reading each
//! recognized key once. Keys a shape does not recognize are reported at
//! `warn` level and otherwise ignored.

use crate::error::{GeneratorError, GeneratorResult};
use lib_types::WaveformKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Scalar quantity (seconds, amplitude, ratio, count).
    Scalar(f64),

    /// Sample series (custom waveform `t` / `y`).
    Series(Vec<f64>),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(values: Vec<f64>) -> Self {
        Self::Series(values)
    }
}

/// Parameter map keyed by name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Build a [`Parameters`] map from scalar pairs.
pub fn scalar_params<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Parameters {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), ParamValue::Scalar(v)))
        .collect()
}

/// Reads typed values out of a [`Parameters`] map for one waveform kind.
pub(crate) struct ParamReader<'a> {
    kind: WaveformKind,
    params: &'a Parameters,
    recognized: Vec<&'static str>,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(kind: WaveformKind, params: &'a Parameters) -> Self {
        Self {
            kind,
            params,
            recognized: Vec::new(),
        }
    }

    /// Optional finite scalar.
    pub(crate) fn scalar(&mut self, name: &'static str) -> GeneratorResult<Option<f64>> {
        self.recognized.push(name);
        match self.params.get(name) {
            None => Ok(None),
            Some(ParamValue::Scalar(v)) if v.is_finite() => Ok(Some(*v)),
            Some(ParamValue::Scalar(v)) => {
                Err(self.invalid(name, format!("must be finite, got {}", v)))
            }
            Some(ParamValue::Series(_)) => Err(self.invalid(name, "expected a number, got a list")),
        }
    }

    /// Required finite scalar.
    pub(crate) fn required(&mut self, name: &'static str) -> GeneratorResult<f64> {
        self.scalar(name)?
            .ok_or_else(|| self.invalid(name, "missing required parameter"))
    }

    /// Optional non-negative integer count.
    pub(crate) fn count(&mut self, name: &'static str) -> GeneratorResult<Option<usize>> {
        match self.scalar(name)? {
            None => Ok(None),
            Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(Some(v as usize)),
            Some(v) => {
                Err(self.invalid(name, format!("must be a non-negative integer, got {}", v)))
            }
        }
    }

    /// Required sample series.
    pub(crate) fn series(&mut self, name: &'static str) -> GeneratorResult<Vec<f64>> {
        self.recognized.push(name);
        match self.params.get(name) {
            Some(ParamValue::Series(values)) => Ok(values.clone()),
            Some(ParamValue::Scalar(_)) => Err(self.invalid(name, "expected a list of numbers")),
            None => Err(self.invalid(name, "missing required parameter")),
        }
    }

    /// Warn about keys no reader call asked for.
    pub(crate) fn finish(self) {
        for key in self.params.keys() {
            if !self.recognized.contains(&key.as_str()) {
                tracing::warn!(
                    "Ignoring unrecognized parameter '{}' for {} waveform",
                    key,
                    self.kind
                );
            }
        }
    }

    fn invalid(&self, name: &str, reason: impl Into<String>) -> GeneratorError {
        GeneratorError::invalid(self.kind, name, reason)
    }
}
