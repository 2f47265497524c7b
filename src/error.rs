//! Error types for ratekey.

use thiserror::Error;

/// Main error type for ratekey operations.
#[derive(Error, Debug)]
pub enum RatekeyError {
    /// The per-route rate limiting document could not be decoded.
    ///
    /// The message is the decoder's own text, unmodified.
    #[error("{message}")]
    ConfigParse { message: String },

    /// The rate limiting document could not be encoded
    #[error("Config encode error: {0}")]
    ConfigEncode(#[source] serde_json::Error),

    /// The credential carried in the `Authorization` header is not valid base64
    #[error("Credential decode error: {0}")]
    CredentialDecode(#[from] base64::DecodeError),

    /// The request body stream could not be read
    #[error("Body read error: {0}")]
    BodyRead(#[source] std::io::Error),

    /// An active configuration names a strategy that does not exist
    #[error("Unknown strategy name: {0:?}")]
    UnknownStrategy(String),

    /// Process settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// A request fixture could not be turned into a request
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// The host rejected the computed session
    #[error("Session error: {0}")]
    Session(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RatekeyError {
    pub(crate) fn config_parse(err: serde_json::Error) -> Self {
        RatekeyError::ConfigParse {
            message: err.to_string(),
        }
    }
}

/// Result type alias for ratekey operations.
pub type Result<T> = std::result::Result<T, RatekeyError>;
