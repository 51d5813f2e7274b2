//! Error types for implantpass.
//!
//! This module defines the crate-level error type. Decoder failures have their
//! own narrower type, [`ParseFailure`](crate::codec::ParseFailure), which is
//! wrapped here for callers that prefer a single error type with `?`.

use thiserror::Error;

use crate::codec::ParseFailure;

/// The main error type for implantpass operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Codec Errors ===
    /// A collection encode was requested with no procedures.
    #[error("no procedures available to generate QR code")]
    EmptyInput,

    /// Building the QR symbol or encoding the raster failed.
    #[error("failed to render QR code: {0}")]
    Rendering(String),

    /// Payload text could not be decoded.
    #[error("failed to decode QR payload: {0}")]
    Decode(#[from] ParseFailure),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for implantpass operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::Rendering(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Rendering(err.to_string())
    }
}

impl Error {
    /// Create a new rendering error.
    #[must_use]
    pub fn rendering(message: impl Into<String>) -> Self {
        Self::Rendering(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error was caused by an empty collection encode.
    #[must_use]
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptyInput)
    }

    /// The decoder failure wrapped by this error, if any.
    #[must_use]
    pub fn parse_failure(&self) -> Option<&ParseFailure> {
        match self {
            Self::Decode(failure) => Some(failure),
            _ => None,
        }
    }
}
