//! Spec validation errors

use thiserror::Error;

/// Errors raised when a resource spec cannot be acted upon as written
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// Neither of two mutually exclusive fields was set
    #[error("one of {0} or {1} must be set")]
    MissingOneOf(&'static str, &'static str),

    /// Both of two mutually exclusive fields were set
    #[error("only one of {0} or {1} may be set")]
    Conflicting(&'static str, &'static str),

    /// A resource reference carried neither an ID nor a name
    #[error("{0} must specify an id or a name")]
    EmptyReference(&'static str),

    /// A field held a value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field path
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },
}
