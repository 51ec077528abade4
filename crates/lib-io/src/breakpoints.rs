//! Breakpoint table parser.
//!
//! A breakpoint table lists one `time amplitude` pair per line:
//!
//! ```text
//! # loop current, seconds / amperes
//! 0.0     0.0
//! 1e-3,   1.0
//! 9e-3    1.0   ! end of on-time
//! 1.0e-2  0.0
//! ```
//!
//! - values separated by whitespace, tabs, or a comma
//! - `#` and `!` start a comment, on their own line or after the values
//! - blank lines are skipped
//! - a non-numeric first line (e.g. `time_s,amplitude`) is taken as a header

use crate::error::ParseError;
use lib_types::{Waveform, WaveformKind};
use nom::{
    branch::alt,
    character::complete::{char, one_of, space0, space1},
    combinator::{eof, opt, rest, value},
    number::complete::double,
    sequence::preceded,
    IResult, Parser,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Parsed `(t, y)` pairs in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BreakpointTable {
    /// Times in seconds.
    pub t: Vec<f64>,

    /// Amplitude at each time.
    pub y: Vec<f64>,
}

impl BreakpointTable {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Multiply every time by `factor` (e.g. 1e-3 for a table in ms).
    pub fn scale_time(mut self, factor: f64) -> Self {
        self.t.iter_mut().for_each(|t| *t *= factor);
        self
    }

    /// Convert to a custom [`Waveform`], checking the waveform invariants.
    pub fn into_waveform(self) -> Result<Waveform, ParseError> {
        Waveform::new(self.t, self.y, WaveformKind::Custom, BTreeMap::new())
            .map_err(|e| ParseError::invalid_value("breakpoints", e.to_string()))
    }
}

/// Parse a breakpoint table from a string.
pub fn parse_breakpoints(content: &str) -> Result<BreakpointTable, ParseError> {
    let mut table = BreakpointTable::default();
    let mut header_allowed = true;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        if header_allowed && trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
            tracing::debug!("Skipping header line {}: '{}'", line_no, trimmed);
            header_allowed = false;
            continue;
        }
        header_allowed = false;

        let (t, y) = match parse_row(line) {
            Ok((_, row)) => row,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let column = line.len() - e.input.len() + 1;
                return Err(ParseError::syntax(
                    line_no,
                    column,
                    format!("expected '<time> <amplitude>', found '{}'", e.input.trim_end()),
                ));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(ParseError::syntax(line_no, line.len() + 1, "incomplete row"));
            }
        };

        if !t.is_finite() || !y.is_finite() {
            return Err(ParseError::syntax(line_no, 1, "time and amplitude must be finite"));
        }

        table.t.push(t);
        table.y.push(y);
    }

    if table.is_empty() {
        return Err(ParseError::InvalidFormat {
            format: "breakpoint table".to_string(),
            message: "no data rows".to_string(),
        });
    }

    Ok(table)
}

/// Parse a breakpoint table from a path.
pub fn parse_breakpoint_file(path: &Path) -> Result<BreakpointTable, ParseError> {
    let content = std::fs::read_to_string(path)?;
    let table = parse_breakpoints(&content)?;
    tracing::debug!("Read {} breakpoints from {}", table.len(), path.display());
    Ok(table)
}

// ============================================================================
// Nom Parsers (nom 8 compatible)
// ============================================================================

fn parse_row(input: &str) -> IResult<&str, (f64, f64)> {
    let (input, _) = space0(input)?;
    let (input, t) = double(input)?;
    let (input, _) = separator(input)?;
    let (input, y) = double(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = opt(trailing_comment).parse(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (t, y)))
}

fn separator(input: &str) -> IResult<&str, ()> {
    alt((value((), (space0, char(','), space0)), value((), space1))).parse(input)
}

fn trailing_comment(input: &str) -> IResult<&str, &str> {
    preceded(one_of("#!"), rest).parse(input)
}
