//! The `error` module defines the error type for fallible relay setup and
//! collaborator calls.
//!
//! Per-message failures (bad frames, dead destinations) are not errors at
//! this level; they are logged and dropped where they happen.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("presence store error: {0}")]
    Presence(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("framing error: {0}")]
    Frame(#[from] LinesCodecError),
}

pub type Result<T> = std::result::Result<T, RelayError>;
