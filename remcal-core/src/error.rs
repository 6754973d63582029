//! Error types for remcal.

use thiserror::Error;

/// Errors that can occur while bridging a Remind script and iCalendar.
#[derive(Error, Debug)]
pub enum RemcalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),

    #[error("Evaluator I/O error: {0}")]
    EvaluatorIo(#[source] std::io::Error),

    #[error("Malformed occurrence at {location}: {reason}")]
    MalformedOccurrence { location: String, reason: String },

    #[error("Occurrences of {uid} mix timed and untimed entries")]
    InconsistentOccurrence { uid: String },

    #[error("Unsupported recurrence: {0}")]
    UnsupportedRecurrence(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Event is missing required property {0}")]
    MissingProperty(&'static str),

    #[error("Invalid object name '{0}'")]
    InvalidUid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for remcal operations.
pub type RemcalResult<T> = Result<T, RemcalError>;
