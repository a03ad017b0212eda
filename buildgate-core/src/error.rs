//! Error types for buildgate

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gate operations
#[derive(Error, Debug)]
pub enum GateError {
    /// No signature header, or one that cannot be parsed
    #[error("Invalid or missing signature: {0}")]
    MissingOrMalformedSignature(String),

    /// Signature present but does not validate against the secret
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Request body could not be read
    #[error("Cannot read request body: {0}")]
    BodyReadError(String),

    /// Request body is not a valid build request
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Policy file could not be read
    #[error("Cannot read policy file {path}: {source}")]
    PolicyIo {
        /// File that failed to open
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Policy file could not be decoded
    #[error("Cannot decode policy file {path}: {reason}")]
    PolicyDecode {
        /// File that failed to decode
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
