//! Error types for the finboard pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the finboard pipeline.
///
/// The first four variants are the user-visible taxonomy: each one ends the
/// current request and is shown to the user as a message.
#[derive(Error, Debug)]
pub enum Error {
    /// Source unreachable, malformed, or rate-limited after every fallback.
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// No normalization rule matches the input shape.
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// Every row was unparseable.
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// A valid series exists but nothing falls inside the requested range.
    #[error("Empty range: {0}")]
    EmptyRange(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Insufficient data for computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create an ingest error.
    pub fn ingest(msg: impl Into<String>) -> Self {
        Error::Ingest(msg.into())
    }

    /// Create an unrecognized format error.
    pub fn unrecognized_format(msg: impl Into<String>) -> Self {
        Error::UnrecognizedFormat(msg.into())
    }

    /// Create a normalization error.
    pub fn normalization(msg: impl Into<String>) -> Self {
        Error::Normalization(msg.into())
    }

    /// Create an empty range error.
    pub fn empty_range(msg: impl Into<String>) -> Self {
        Error::EmptyRange(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Whether the error comes from bad input shape or content rather than
    /// from the environment (network, filesystem).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::UnrecognizedFormat(_)
                | Error::Normalization(_)
                | Error::EmptyRange(_)
                | Error::Config(_)
                | Error::InsufficientData(_)
        )
    }
}
