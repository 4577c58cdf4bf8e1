//! Error types for turnstile

use thiserror::Error;

/// Result type alias for turnstile operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a voice session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing or invalid credentials)
    #[error("configuration error: {0}")]
    Config(String),

    /// Transcription stream could not be opened or failed mid-session
    #[error("connection error: {0}")]
    Connection(String),

    /// Upstream service answered with a non-success status
    #[error("{service} returned {status}: {body}")]
    Upstream {
        /// Service that failed ("generation", "tts")
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Response generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio device or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether retrying the failed call could succeed
    ///
    /// Timeouts, connection failures, rate limits (429) and server errors (5xx)
    /// are transient. Everything else is permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Upstream { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
