//! REST quote client for the startup price bootstrap.
//!
//! `GET {quote_url}?symbol=GME&token=...` answers with the latest quote;
//! only the current price field `c` is used. A zero price means the
//! endpoint has no quote for the symbol.

use crate::error::{AppError, AppResult};
use preorder_core::Price;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default timeout for quote requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price.
    #[serde(rename = "c", default)]
    current: Option<Decimal>,
}

pub struct QuoteClient {
    client: Client,
    url: String,
    token: String,
}

impl QuoteClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Quote(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            token: token.into(),
        })
    }

    /// Latest price for `symbol`, `None` when the endpoint has none.
    pub async fn latest_price(&self, symbol: &str) -> AppResult<Option<Price>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("symbol", symbol), ("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Quote(format!("{symbol}: request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Quote(format!("{symbol}: HTTP {status}")));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| AppError::Quote(format!("{symbol}: invalid response: {e}")))?;

        debug!(symbol, current = ?quote.current, "Fetched quote");
        Ok(quote
            .current
            .filter(|c| *c > Decimal::ZERO)
            .map(Price::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_response() {
        let q: QuoteResponse =
            serde_json::from_str(r#"{"c":22.1,"h":23,"l":21,"o":22,"pc":21.5,"t":1}"#).unwrap();
        assert_eq!(q.current, Some(Decimal::new(221, 1)));

        let empty: QuoteResponse = serde_json::from_str(r#"{"d":null}"#).unwrap();
        assert!(empty.current.is_none());
    }
}
