//! Physical units with type safety.
//!
//! These newtypes keep time, frequency, and source current from being mixed
//! up across the generation and analysis layers. TEM waveforms live on
//! millisecond-to-second scales, so the helpers favour ms over ps/ns.

use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Time duration in seconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub f64);

impl Seconds {
    #[inline]
    pub fn from_ms(ms: f64) -> Self {
        Self(ms * 1e-3)
    }

    #[inline]
    pub fn as_ms(&self) -> f64 {
        self.0 * 1e3
    }

    /// Convert to frequency (reciprocal).
    #[inline]
    pub fn to_frequency(&self) -> Hertz {
        Hertz(1.0 / self.0)
    }

    /// True for a finite, strictly positive duration.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }
}

impl Mul<f64> for Seconds {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self(self.0 * rhs)
    }
}

/// Frequency in Hertz.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hertz(pub f64);

/// Transmitter loop current in Amperes.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amperes(pub f64);

impl Amperes {
    pub const ZERO: Self = Self(0.0);
}
