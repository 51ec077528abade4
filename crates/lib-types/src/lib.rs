//! # lib-types
//!
//! Core type definitions for the TEM waveform toolkit.
//!
//! This crate provides foundational types used throughout the workspace:
//! - Physical units with compile-time safety
//! - Waveform representation for time-domain source signals
//! - Spectrum and statistics records produced by the analyzer
//! - Uniform time-grid helpers

pub mod units;
pub mod grid;
pub mod waveform;
pub mod spectrum;

pub use units::*;
pub use waveform::*;
pub use spectrum::*;
