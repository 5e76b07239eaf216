//! Order vocabulary: action, type, time-in-force and the request value
//! handed to the brokerage session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::Price;

/// Order action: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type. Preorders only ever produce limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
}

/// Time-in-force as written in the preorder store.
///
/// Values other than the two supported ones are kept verbatim so the
/// store re-serializes exactly; such preorders are never eligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TimeInForce {
    GoodTillCanceled,
    GoodTillDay,
    Unsupported(String),
}

impl TimeInForce {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GoodTillCanceled => "GOOD_TILL_CANCELED",
            Self::GoodTillDay => "GOOD_TILL_DAY",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for TimeInForce {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "GOOD_TILL_CANCELED" => Self::GoodTillCanceled,
            "GOOD_TILL_DAY" => Self::GoodTillDay,
            _ => Self::Unsupported(raw),
        }
    }
}

impl From<TimeInForce> for String {
    fn from(tif: TimeInForce) -> Self {
        tif.as_str().to_string()
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order request built from a preorder at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub action: OrderAction,
    pub order_type: OrderType,
    pub limit_price: Price,
    pub product_id: String,
    pub size: u32,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Notional value of the order (`limit_price * size`).
    pub fn notional(&self) -> rust_decimal::Decimal {
        self.limit_price.inner() * rust_decimal::Decimal::from(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_time_in_force_known_values() {
        let tif: TimeInForce = serde_json::from_str("\"GOOD_TILL_DAY\"").unwrap();
        assert_eq!(tif, TimeInForce::GoodTillDay);
        assert!(tif.is_supported());
    }

    #[test]
    fn test_time_in_force_unknown_is_preserved() {
        let tif: TimeInForce = serde_json::from_str("\"FILL_OR_KILL\"").unwrap();
        assert!(!tif.is_supported());
        assert_eq!(serde_json::to_string(&tif).unwrap(), "\"FILL_OR_KILL\"");
    }

    #[test]
    fn test_action_wire_format() {
        assert_eq!(serde_json::to_string(&OrderAction::Sell).unwrap(), "\"SELL\"");
        let action: OrderAction = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(action, OrderAction::Buy);
    }

    #[test]
    fn test_request_notional() {
        let request = OrderRequest {
            action: OrderAction::Buy,
            order_type: OrderType::Limit,
            limit_price: Price::new(dec!(12.50)),
            product_id: "331868".to_string(),
            size: 4,
            time_in_force: TimeInForce::GoodTillDay,
        };
        assert_eq!(request.notional(), dec!(50.00));
    }
}
