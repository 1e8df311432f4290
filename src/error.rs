// src/error.rs

use thiserror::Error;

/// Errors surfaced by playground operations that have no in-flight message
/// to absorb them (storage, import/export, clipboard, discovery).
#[derive(Error, Debug)]
pub enum PlaygroundError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}, body: {body}")]
    Api { status: u16, body: String },

    #[error("could not start event stream: {0}")]
    StreamSetup(String),

    /// The imported file parsed but lacks `inputs` or `parameterEnabled`.
    #[error("invalid config file: {0}")]
    InvalidConfigFile(String),

    #[error("custom request body is not valid JSON: {0}")]
    InvalidCustomBody(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("discovery request failed: {0}")]
    Discovery(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),
}

pub type Result<T> = std::result::Result<T, PlaygroundError>;
