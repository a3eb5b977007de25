//! Error types for the intake bot.
//!
//! Validation failures are *not* errors — they are ordinary
//! [`crate::flow::Outcome`] values consumed by the transport to decide what
//! the user sees.

/// Top-level error type for the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Messaging-transport errors (Bot API calls).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Bot API method {method} failed: {detail}")]
    Api { method: String, detail: String },
}

/// External-sink errors.
///
/// Notification failures are swallowed after logging; attachment-fetch and
/// storage failures propagate and keep the session alive so the user can
/// retry by resending the final event.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Notification delivery failed: {0}")]
    Notify(String),

    #[error("Attachment fetch failed: {0}")]
    AttachmentFetch(String),

    #[error("Durable storage failed: {0}")]
    Storage(String),
}

/// Result type alias for the intake bot.
pub type Result<T> = std::result::Result<T, Error>;
