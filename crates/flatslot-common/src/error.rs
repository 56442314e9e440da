//! Error types for flatslot-common.

use thiserror::Error;

/// Common error type for flatslot reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A read would cross the end of the buffer.
    #[error("read of {needed} bytes at position {position} exceeds buffer length {len}")]
    OutOfBounds {
        position: usize,
        needed: usize,
        len: usize,
    },

    /// A position computed from buffer contents overflowed `usize`.
    #[error("position overflow: {base} + {delta}")]
    PositionOverflow { base: usize, delta: i64 },

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
