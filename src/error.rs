//! Error types for the Camille assistant

use thiserror::Error;

/// Result type alias for Camille operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant core and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Completion backend returned a non-success status
    #[error("completion API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Completion backend returned a body we could not interpret
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// Tool result payload handed to memory could not be parsed
    #[error("invalid tool payload: {0}")]
    InvalidToolPayload(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
