//! Error types for a3s-reply

use thiserror::Error;

/// Errors that can occur while running the reply bot
#[derive(Debug, Error)]
pub enum ReplyError {
    /// Configuration error (bad port, unreadable config file, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse failure
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML config render failure
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Session collaborator could not connect
    #[error("Connection error: {0}")]
    Connection(String),

    /// Session is connected but has no authenticated account
    #[error("Session is not authenticated: {0}")]
    NotAuthenticated(String),

    /// Pairing stream could not be opened or failed mid-way
    #[error("Pairing error: {0}")]
    Pairing(String),

    /// Outbound message failure
    #[error("Failed to send message to '{recipient}': {reason}")]
    Send {
        recipient: String,
        reason: String,
    },

    /// QR image rendering failure
    #[error("Render error: {0}")]
    Render(String),

    /// Credential / device storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP server failure (bind, serve)
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias for reply-bot operations
pub type Result<T> = std::result::Result<T, ReplyError>;
