//! Error types for preorder-core.

use thiserror::Error;

use crate::preorder::PreorderStatus;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: PreorderStatus,
        to: PreorderStatus,
    },

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
