//! Error types for parsing operations.

use thiserror::Error;

/// Errors that can occur while reading breakpoint tables.
#[derive(Debug, Error)]
pub enum ParseError {
    /// I/O error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Syntax error in the file.
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Invalid value for a field.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Invalid file format.
    #[error("Invalid {format} format: {message}")]
    InvalidFormat { format: String, message: String },
}

impl ParseError {
    /// Create a syntax error at a specific location.
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
