//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] preorder_ws::WsError),

    #[error("Feed error: {0}")]
    Feed(#[from] preorder_feed::FeedError),

    #[error("Executor error: {0}")]
    Executor(#[from] preorder_executor::ExecutorError),

    #[error("Session error: {0}")]
    Session(#[from] preorder_executor::SessionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] preorder_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] preorder_persistence::PersistenceError),

    #[error("Quote error: {0}")]
    Quote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
