use thiserror::Error;

/// Validation and contract errors exposed by `optiscan-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("underlying cannot be empty")]
    EmptyUnderlying,
    #[error("underlying length {len} exceeds max {max}")]
    UnderlyingTooLong { len: usize, max: usize },
    #[error("underlying must start with an ASCII letter: '{ch}'")]
    UnderlyingInvalidStart { ch: char },
    #[error("underlying contains invalid character '{ch}' at index {index}")]
    UnderlyingInvalidChar { ch: char, index: usize },

    #[error("instrument name '{value}' is not UNDERLYING-DDMMMYY-STRIKE-C|P: {reason}")]
    InvalidInstrumentName { value: String, reason: &'static str },
    #[error("strike must be positive")]
    NonPositiveStrike,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unix timestamp {millis}ms is out of range")]
    TimestampOutOfRange { millis: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("invalid configuration '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Venue(#[from] crate::venue::VenueError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
