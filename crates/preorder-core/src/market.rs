//! Price pipeline values and the seam between aggregation and evaluation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Price;
use crate::BoxFuture;

/// Volume-weighted contribution of one inbound message for one symbol.
///
/// `notional` is `Σ(volume · price)` over the prints of that symbol in the
/// message, so contributions can be summed before dividing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeContribution {
    pub symbol: String,
    pub volume: Decimal,
    pub notional: Decimal,
}

impl TradeContribution {
    pub fn new(symbol: impl Into<String>, volume: Decimal, notional: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            volume,
            notional,
        }
    }

    /// Volume-weighted price, `None` when the volume is zero.
    pub fn price(&self) -> Option<Price> {
        if self.volume.is_zero() {
            return None;
        }
        Some(Price::new(self.notional / self.volume))
    }
}

/// Representative price of a symbol over one aggregation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub symbol: String,
    pub price: Price,
}

impl AggregatedPrice {
    pub fn new(symbol: impl Into<String>, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// Receives aggregated prices.
///
/// Implemented by the order evaluator; the aggregator awaits each call
/// before emitting the next price.
pub trait PriceHandler: Send + Sync {
    fn on_price(&self, price: AggregatedPrice) -> BoxFuture<'_, ()>;
}
