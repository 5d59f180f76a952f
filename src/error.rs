//! Error types for the vidfetch service.

use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // User input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session ID already exists: {0}")]
    DuplicateSession(String),

    // Collaborator errors
    #[error("Media source error: {0}")]
    MediaSource(String),

    #[error("Download failed: {0}")]
    Execution(String),

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    // Anything unanticipated. Logged with full context at the point of
    // capture; only the summary string may reach the wire.
    #[error("Internal error: {0}")]
    Internal(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Message that is safe to send to a client. Internal errors are reduced
    /// to a generic summary; everything else is already user-facing.
    pub fn client_message(&self) -> String {
        match self {
            Error::Internal(_) | Error::Io(_) | Error::Json(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether this error was caused by bad user input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::DuplicateSession(_) | Error::InvalidFilename(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
