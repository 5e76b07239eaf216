//! Preorder records and the book that holds them.
//!
//! A preorder is created by an operator, evaluated against aggregated
//! prices, and moved exactly once out of `Pending`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use crate::order::{OrderAction, OrderRequest, OrderType, TimeInForce};

/// Lifecycle status of a preorder.
///
/// Monotonic: `Pending` moves to `OrderCreated` or `Canceled` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreorderStatus {
    #[default]
    Pending,
    OrderCreated,
    Canceled,
}

impl PreorderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PreorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::OrderCreated => write!(f, "ORDER_CREATED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// A persisted conditional order rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preorder {
    /// Market-data symbol the rule watches (e.g. "GME").
    pub symbol: String,
    pub action: OrderAction,
    pub limit_price: Price,
    pub size: u32,
    pub time_in_force: TimeInForce,
    /// Brokerage product identifier the order is placed on.
    pub product_id: String,
    #[serde(default)]
    pub status: PreorderStatus,
    #[serde(default)]
    pub order_created_utc: Option<DateTime<Utc>>,
    /// Keys an operator added to the record; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Preorder {
    pub fn is_pending(&self) -> bool {
        self.status == PreorderStatus::Pending
    }

    /// Check the record is well-formed (positive price and size).
    pub fn validate(&self) -> Result<()> {
        if !self.limit_price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "{} limit price must be positive, got {}",
                self.symbol, self.limit_price
            )));
        }
        if self.size == 0 {
            return Err(CoreError::InvalidSize(format!(
                "{} size must be positive",
                self.symbol
            )));
        }
        Ok(())
    }

    /// Build the limit order this preorder places.
    pub fn to_order_request(&self) -> OrderRequest {
        OrderRequest {
            action: self.action,
            order_type: OrderType::Limit,
            limit_price: self.limit_price,
            product_id: self.product_id.clone(),
            size: self.size,
            time_in_force: self.time_in_force.clone(),
        }
    }

    /// Record a confirmed order.
    pub fn mark_order_created(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(PreorderStatus::OrderCreated)?;
        self.order_created_utc = Some(at);
        Ok(())
    }

    /// Record a terminal rejection.
    pub fn mark_canceled(&mut self) -> Result<()> {
        self.transition(PreorderStatus::Canceled)
    }

    fn transition(&mut self, to: PreorderStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CoreError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

impl fmt::Display for Preorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x {} @ {}",
            self.symbol, self.action, self.product_id, self.size, self.limit_price
        )
    }
}

/// Full contents of the preorder store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreorderBook {
    #[serde(default)]
    pub preorders: Vec<Preorder>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PreorderBook {
    pub fn new(preorders: Vec<Preorder>) -> Self {
        Self {
            preorders,
            extra: Map::new(),
        }
    }

    /// Distinct symbols across all preorders, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.preorders.iter().map(|p| p.symbol.clone()).collect()
    }

    /// Indices of preorders watching `symbol`.
    pub fn indices_for(&self, symbol: &str) -> Vec<usize> {
        self.preorders
            .iter()
            .enumerate()
            .filter(|(_, p)| p.symbol == symbol)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.preorders.iter().filter(|p| p.is_pending()).count()
    }
}
