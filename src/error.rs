//! Error types for the Ibdaa studio

use thiserror::Error;

/// Result type alias for studio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the studio
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Image edit request failed; carries the user-facing message
    #[error("{0}")]
    ImageEdit(String),

    /// Chat request failed; carries the user-facing message
    #[error("{0}")]
    Chat(String),

    /// Local validation failure, no request was attempted
    #[error("{0}")]
    Validation(String),

    /// Speech synthesis error
    #[error("speech error: {0}")]
    Speech(String),

    /// Audio playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Gemini API returned a non-success status
    #[error("upstream error: {0}")]
    Upstream(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 decode error
    #[error("decode error: {0}")]
    Decode(#[from] base64::DecodeError),
}
