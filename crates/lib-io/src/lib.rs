//! # lib-io
//!
//! Readers for waveform data files.
//!
//! This crate provides a parser for breakpoint tables: plain-text files
//! with one `time amplitude` pair per line, as exported by loggers,
//! spreadsheets, or this toolkit's own waveform CSV export.
//!
//! Parsers are built using the `nom` parser combinator library.

pub mod error;
pub mod breakpoints;

pub use error::ParseError;
pub use breakpoints::{parse_breakpoint_file, parse_breakpoints, BreakpointTable};
