//! # Validation Errors
//!
//! Structured validation errors shared by request DTOs, configuration
//! loading, and domain constructors. Each variant carries the offending
//! input so operators can diagnose a rejection without reading logs.

use thiserror::Error;

/// Validation errors for domain primitives and request fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("field \"{0}\" must not be empty")]
    EmptyField(&'static str),

    /// A user identifier could not be parsed as a UUID.
    #[error("invalid user id: \"{0}\"")]
    InvalidUserId(String),

    /// A token amount was zero where a positive amount is required.
    #[error("amount for \"{0}\" must be greater than zero")]
    ZeroAmount(&'static str),

    /// A percentage was outside its permitted range.
    #[error("percentage {value} for \"{field}\" outside {min}..={max}")]
    PercentOutOfRange {
        /// The field being validated.
        field: &'static str,
        /// The rejected value.
        value: u32,
        /// Inclusive lower bound.
        min: u32,
        /// Inclusive upper bound.
        max: u32,
    },

    /// A free-text field exceeded its maximum length.
    #[error("field \"{field}\" exceeds {max} characters")]
    TooLong {
        /// The field being validated.
        field: &'static str,
        /// Maximum permitted length in characters.
        max: usize,
    },

    /// A configuration or policy value violated a constraint.
    #[error("invalid setting \"{field}\": {reason}")]
    InvalidSetting {
        /// The setting being validated.
        field: &'static str,
        /// What constraint was violated.
        reason: String,
    },

    /// An enumerated code was not recognised.
    #[error("unknown {kind}: \"{value}\"")]
    UnknownCode {
        /// What kind of code was being parsed (e.g. "transaction kind").
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
}
