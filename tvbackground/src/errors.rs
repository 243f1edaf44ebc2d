use thiserror::Error;

/// Errors raised by the background subsystem.
///
/// Each variant carries a human-readable message; the state machine turns
/// `Persistence`, `Import` and `Scan` into the `Error` state of the UI.
/// `Playback` and `Decode` are absorbed by their components and only logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackgroundError {
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Import error: {0}")]
    Import(String),
    #[error("Media scan error: {0}")]
    Scan(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Playback error: {0}")]
    Playback(String),
    // Never surfaced: resolution falls back to the verbatim locator.
    #[error("Cannot resolve {0}")]
    Resolution(String),
    #[error("Invalid background setting: {0}")]
    InvalidSetting(String),
}

impl BackgroundError {
    pub fn persistence(message: impl std::fmt::Display) -> Self {
        BackgroundError::Persistence(message.to_string())
    }

    pub fn import(message: impl std::fmt::Display) -> Self {
        BackgroundError::Import(message.to_string())
    }

    pub fn scan(message: impl std::fmt::Display) -> Self {
        BackgroundError::Scan(message.to_string())
    }

    pub fn decode(message: impl std::fmt::Display) -> Self {
        BackgroundError::Decode(message.to_string())
    }

    pub fn playback(message: impl std::fmt::Display) -> Self {
        BackgroundError::Playback(message.to_string())
    }
}

/// Result type for background operations
pub type Result<T> = std::result::Result<T, BackgroundError>;
