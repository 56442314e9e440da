//! Error types for the conversion registry.

use thiserror::Error;

/// Errors that can occur while registering or running converters.
#[derive(Debug, Error)]
pub enum Error {
    /// No converter is registered under this name.
    #[error("type \"{0}\" hasn't been registered")]
    UnknownType(String),

    /// A converter is already registered under this name.
    #[error("type \"{0}\" is already registered")]
    DuplicateRegistration(String),

    /// Converter input does not have the shape its record expects.
    #[error("invalid input for {type_name}: {reason}")]
    InvalidInput { type_name: String, reason: String },

    /// Reading or verifying a produced buffer failed.
    #[error("codec error: {0}")]
    Codec(#[from] flatslot_codec::Error),

    /// Input could not be decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::InvalidInput`] from a deserialization failure.
    pub fn invalid_input(type_name: &str, reason: impl ToString) -> Self {
        Error::InvalidInput {
            type_name: type_name.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;
