//! # lib-sim
//!
//! Adapter between generated waveforms and time-domain EM simulators.
//!
//! A simulator needs the transmitter current as a callable function of time
//! and, for off-time modelling, the instant the current switches off. This
//! crate provides:
//!
//! - [`PiecewiseLinearSource`]: breakpoints with collinear points removed,
//!   the off-time, and a JSON exchange format
//! - [`SourceCurrent`]: the callable current interface, implemented for both
//!   sources and raw waveforms

pub mod error;
pub mod source;

pub use error::SimError;
pub use source::{PiecewiseLinearSource, SourceCurrent};
