//! Feed message types.
//!
//! Inbound frames carry a `type` discriminator; only `trade` frames carry
//! price data:
//! ```json
//! {"type":"trade","data":[{"s":"GME","p":22.1,"v":100,"t":1575526691134}]}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single trade print.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradePrint {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "v")]
    pub volume: Decimal,
    /// Exchange timestamp (Unix milliseconds).
    #[serde(rename = "t", default)]
    pub timestamp_ms: Option<i64>,
}

/// Inbound feed message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Batch of trade prints, possibly for several symbols.
    Trade {
        #[serde(default)]
        data: Vec<TradePrint>,
    },
    /// Server keep-alive.
    Ping,
    /// Server-side error (bad symbol, auth, ...).
    Error {
        #[serde(default)]
        msg: String,
    },
    /// Any other message kind.
    #[serde(other)]
    Other,
}

impl FeedMessage {
    pub fn is_trade(&self) -> bool {
        matches!(self, Self::Trade { .. })
    }
}

/// Subscribe directive, one per symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub symbol: &'a str,
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(symbol: &'a str) -> Self {
        Self {
            kind: "subscribe",
            symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_trade_batch() {
        let text = r#"{"type":"trade","data":[
            {"s":"GME","p":22.1,"v":100,"t":1575526691134,"c":["1"]},
            {"s":"AMC","p":4.5,"v":0}
        ]}"#;
        let msg: FeedMessage = serde_json::from_str(text).unwrap();
        let FeedMessage::Trade { data } = msg else {
            panic!("expected trade message");
        };
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].symbol, "GME");
        assert_eq!(data[0].price, dec!(22.1));
        assert_eq!(data[0].volume, dec!(100));
        assert_eq!(data[0].timestamp_ms, Some(1575526691134));
        assert_eq!(data[1].timestamp_ms, None);
    }

    #[test]
    fn test_parse_non_trade_messages() {
        let ping: FeedMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, FeedMessage::Ping);

        let err: FeedMessage =
            serde_json::from_str(r#"{"type":"error","msg":"Invalid symbol"}"#).unwrap();
        assert_eq!(
            err,
            FeedMessage::Error {
                msg: "Invalid symbol".to_string()
            }
        );

        let news: FeedMessage = serde_json::from_str(r#"{"type":"news","data":[]}"#).unwrap();
        assert_eq!(news, FeedMessage::Other);
        assert!(!news.is_trade());
    }

    #[test]
    fn test_subscribe_request_wire_format() {
        let req = SubscribeRequest::new("GME");
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"type":"subscribe","symbol":"GME"}"#
        );
    }
}
