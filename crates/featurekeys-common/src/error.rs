//! Error types for featurekeys
//!
//! Decoding a single cache key never produces an error; these variants cover
//! strict layout parsing, configuration and the key sources.

use thiserror::Error;

/// Common result type for featurekeys operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for featurekeys
#[derive(Debug, Error)]
pub enum Error {
    // Key layout errors
    #[error("malformed key at offset {offset}: {reason}")]
    MalformedKey { offset: usize, reason: String },

    #[error("truncated key: need {required} bytes, have {available}")]
    TruncatedKey { required: usize, available: usize },

    // Key source errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("keyspace scan failed: {0}")]
    Scan(String),

    #[error("invalid key dump at line {line}: {reason}")]
    InvalidDump { line: usize, reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),
}

impl Error {
    /// Create a malformed key error at the given offset
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a scan error
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::Scan(msg.into())
    }
}
