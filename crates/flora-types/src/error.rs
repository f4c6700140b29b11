//! Error types for data parsing in flora-types.

use thiserror::Error;

/// Errors that can occur when parsing Mi Flora characteristic payloads.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in flora-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is shorter than the layout requires.
    #[error("Insufficient bytes: {what} requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The payload has the right length but its content is unusable.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using flora-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
