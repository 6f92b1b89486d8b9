use std::fmt;

use thiserror::Error;

use crate::generator::DecodeMode;

/// A single field-level contract violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}: {}", self.field, self.message)
        } else {
            write!(f, "{}: {} (got '{}')", self.field, self.message, self.value)
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum Error {
    /// Transport, auth or rate-limit failure from a text generator backend.
    #[error("generator '{backend}' unavailable: {message}")]
    GeneratorUnavailable { backend: String, message: String },

    /// The generator answered but the text is not a structured object.
    #[error("generator '{backend}' returned undecodable {mode} output: {message}")]
    DecodeFailed {
        backend: String,
        mode: DecodeMode,
        message: String,
    },

    /// Every (backend, mode) attempt failed.
    #[error("extraction failed after {attempts} attempt(s); last error: {last}")]
    ExtractionFailed { attempts: usize, last: Box<Error> },

    #[error("validation failed: {}", join_violations(.0))]
    ValidationFailed(Vec<Violation>),

    /// One or more interview answers failed to parse; the batch is rejected.
    #[error("invalid input: {}", join_violations(.0))]
    InvalidInput(Vec<Violation>),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Violations carried by `ValidationFailed` / `InvalidInput`, empty otherwise.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Error::ValidationFailed(v) | Error::InvalidInput(v) => v,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to parse a single free-text answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(pub String);
