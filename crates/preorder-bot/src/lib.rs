//! Preorder execution agent.
//!
//! Wires the components together:
//! - market data WebSocket and trade ingest
//! - VWAP aggregation
//! - order evaluation through the guarded brokerage session
//! - session keep-alive
//! - preorder store

pub mod app;
pub mod config;
pub mod error;
pub mod quote;
pub mod symbols;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
