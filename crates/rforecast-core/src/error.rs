//! Error types for rforecast.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote evaluation failed: {0}")]
    Eval(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Library '{name}' could not be loaded: {reason}")]
    LibraryUnavailable { name: String, reason: String },

    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error came from the remote side (connection, login,
    /// evaluation or the shape of a remote result) rather than local input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Protocol(_)
                | Error::Auth(_)
                | Error::Eval(_)
                | Error::TypeMismatch { .. }
                | Error::LibraryUnavailable { .. }
                | Error::UnexpectedResult(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
