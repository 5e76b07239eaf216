//! Executor error types.

use preorder_core::CoreError;
use preorder_persistence::PersistenceError;
use thiserror::Error;

/// Failure of a brokerage session call.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Broker call timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Broker error: {0}")]
    Other(String),
}

impl SessionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Authentication(_) => "auth",
            Self::Other(_) => "other",
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    #[error("Preorder error: {0}")]
    Preorder(#[from] CoreError),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
