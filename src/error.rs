//! Error types for the lexis crate.
//!
//! Programming-error faults (operating on a deleted document, an out-of-range
//! term id, combining a pair no rule approved) are panics and never show up
//! here. Everything in this enum is a condition a caller can act on.

use std::io;

use thiserror::Error;

/// The main error type for lexis operations.
#[derive(Error, Debug)]
pub enum LexisError {
    /// I/O errors while reading or writing persisted segments.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization errors for metadata and configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors raised by the fst term maps.
    #[error("FST error: {0}")]
    Fst(#[from] fst::Error),

    /// Corrupt or inconsistent index data.
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A named resource (annotation, document) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A clause that cannot be compiled in the requested form.
    #[error("Unsupported clause: {0}")]
    UnsupportedClause(String),
}

/// Result type alias for lexis operations.
pub type Result<T> = std::result::Result<T, LexisError>;

impl LexisError {
    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        LexisError::Index(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        LexisError::InvalidArgument(msg.into())
    }

    /// Create a new invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        LexisError::InvalidConfig(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        LexisError::NotFound(msg.into())
    }

    /// Create a new unsupported clause error.
    pub fn unsupported_clause<S: Into<String>>(msg: S) -> Self {
        LexisError::UnsupportedClause(msg.into())
    }
}

impl From<regex::Error> for LexisError {
    fn from(err: regex::Error) -> Self {
        LexisError::InvalidArgument(format!("invalid regular expression: {err}"))
    }
}
