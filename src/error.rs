//! Error types for the channel scraper

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid credential {name}: {reason}")]
    InvalidCredential { name: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Authorization required")]
    AuthorizationRequired,

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Logging setup failed: {0}")]
    LoggingError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Configuration errors halt the run before any channel is touched.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::MissingCredential(_) | Error::InvalidCredential { .. } | Error::Config(_)
        )
    }
}

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
