//! Error types for reading and verifying flat buffers.

use thiserror::Error;

/// Why a buffer was judged malformed.
///
/// These all mean the bytes themselves are corrupt or crafted, as opposed to
/// the caller asking for something that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    /// The buffer cannot even hold its header.
    #[error("buffer of {len} bytes is shorter than the {needed}-byte header")]
    TooShort { len: usize, needed: usize },

    /// A computed position points outside the buffer.
    #[error("{0}")]
    OutOfBounds(#[from] flatslot_common::Error),

    /// The field-offset table of a table is unusable.
    #[error("invalid vtable at {position}: {reason}")]
    InvalidVTable {
        position: usize,
        reason: &'static str,
    },

    /// A field's value lies outside its table's declared inline size.
    #[error("field in slot {slot} at offset {offset} exceeds table size {table_len}")]
    FieldOutOfTable {
        slot: u16,
        offset: usize,
        table_len: usize,
    },

    /// String bytes are not UTF-8.
    #[error("string at {position} is not valid UTF-8")]
    InvalidUtf8 { position: usize },

    /// String is not followed by a NUL byte.
    #[error("string at {position} is missing its NUL terminator")]
    MissingTerminator { position: usize },

    /// A value is not aligned to its natural alignment.
    #[error("{what} at {position} is not {alignment}-byte aligned")]
    Unaligned {
        what: &'static str,
        position: usize,
        alignment: usize,
    },

    /// Size prefix disagrees with the actual buffer length.
    #[error("size prefix {prefix} exceeds remaining buffer length {available}")]
    SizePrefix { prefix: usize, available: usize },

    /// Nesting deeper than the verifier allows.
    #[error("table nesting depth exceeds {0}")]
    DepthLimit(usize),

    /// More tables than the verifier allows.
    #[error("table count exceeds {0}")]
    TableLimit(usize),
}

/// Errors that can occur when reading or verifying a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The buffer is corrupt; the read was aborted.
    #[error("malformed buffer: {0}")]
    MalformedBuffer(#[from] Malformed),

    /// Vector index past the vector's declared length.
    #[error("index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Buffer carries a different file identifier.
    #[error("file identifier mismatch: expected {expected:?}, got {actual:?}")]
    IdentifierMismatch { expected: [u8; 4], actual: [u8; 4] },

    /// A field the schema marks as required is absent.
    #[error("required field in slot {slot} is absent")]
    MissingRequiredField { slot: u16 },
}

impl Error {
    /// Whether this error signals a corrupt buffer rather than a caller mistake.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedBuffer(_))
    }
}

impl From<flatslot_common::Error> for Error {
    fn from(err: flatslot_common::Error) -> Self {
        Error::MalformedBuffer(Malformed::OutOfBounds(err))
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
