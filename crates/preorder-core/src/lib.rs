//! Core domain types for the preorder execution agent.
//!
//! This crate provides the types shared by every other crate:
//! - `Preorder`, `PreorderBook`: persisted conditional order rules
//! - `Price`: precision-safe price type
//! - `OrderAction`, `TimeInForce`, `OrderRequest`: order vocabulary
//! - `TradeContribution`, `AggregatedPrice`: price pipeline values
//! - `PriceHandler`: seam between the aggregator and the order evaluator

pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod preorder;

pub use decimal::Price;
pub use error::{CoreError, Result};
pub use market::{AggregatedPrice, PriceHandler, TradeContribution};
pub use order::{OrderAction, OrderRequest, OrderType, TimeInForce};
pub use preorder::{Preorder, PreorderBook, PreorderStatus};

use std::future::Future;
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
