//! WebSocket connection manager.
//!
//! Handles connection lifecycle, automatic reconnection with exponential backoff,
//! and re-subscription of every watched symbol after each (re)connect.

use crate::error::{WsError, WsResult};
use crate::message::{FeedMessage, SubscribeRequest};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use preorder_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Supplies the symbols to subscribe to.
///
/// Queried once per connection open, so symbols added to the store take
/// effect on the next reconnect.
pub trait SymbolSource: Send + Sync {
    fn symbols(&self) -> Vec<String>;
}

impl SymbolSource for Vec<String> {
    fn symbols(&self) -> Vec<String> {
        self.clone()
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// API token appended as `token` query parameter.
    pub token: Option<String>,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Reconnect when nothing arrives for this long (0 = disabled).
    pub idle_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: None,
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            idle_timeout_ms: 120_000,
        }
    }
}

impl ConnectionConfig {
    /// URL with the token query parameter applied.
    pub fn endpoint(&self) -> String {
        match &self.token {
            Some(token) if !token.is_empty() => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", self.url, sep, token)
            }
            _ => self.url.clone(),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    symbols: Arc<dyn SymbolSource>,
    state: Arc<RwLock<ConnectionState>>,
    message_tx: mpsc::Sender<FeedMessage>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(
        config: ConnectionConfig,
        symbols: Arc<dyn SymbolSource>,
        message_tx: mpsc::Sender<FeedMessage>,
    ) -> Self {
        Self {
            config,
            symbols,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            message_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned shutdown token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        Metrics::feed_connected(state == ConnectionState::Connected);
    }

    /// Connect to WebSocket and run message loop until shutdown.
    pub async fn connect(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            let reason = match self.try_connect(&mut attempt).await {
                Ok(()) => {
                    info!("WebSocket connection closed");
                    "closed"
                }
                Err(e) => {
                    error!(error = %e, "WebSocket connection error");
                    match e {
                        WsError::IdleTimeout(_) => "idle",
                        WsError::ConnectionClosed { .. } => "server_close",
                        _ => "error",
                    }
                }
            };

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            attempt += 1;
            *self.reconnect_count.write() = attempt;
            Metrics::feed_reconnect(reason);

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Disconnected);
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(ConnectionState::Reconnecting);

            let delay = self.calculate_backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self, attempt: &mut u32) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        // TCP_NODELAY: trade frames are small and latency-sensitive.
        let (ws_stream, _response) =
            connect_async_tls_with_config(self.config.endpoint(), None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        *attempt = 0;
        *self.reconnect_count.write() = 0;
        info!("WebSocket connected");

        let symbols = self.symbols.symbols();
        for symbol in &symbols {
            let request = serde_json::to_string(&SubscribeRequest::new(symbol))?;
            write.send(Message::Text(request)).await?;
        }
        info!(count = symbols.len(), symbols = ?symbols, "Subscriptions sent");

        let idle = Duration::from_millis(self.config.idle_timeout_ms);
        let mut last_message = Instant::now();

        loop {
            let idle_deadline = last_message + idle;

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }

                msg = read.next() => {
                    last_message = Instant::now();
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                () = tokio::time::sleep_until(idle_deadline), if self.config.idle_timeout_ms > 0 => {
                    warn!(idle_ms = self.config.idle_timeout_ms, "No feed message within idle timeout");
                    return Err(WsError::IdleTimeout(self.config.idle_timeout_ms));
                }
            }
        }
    }

    async fn handle_text_message(&self, text: &str) {
        let msg: FeedMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Unparseable feed message, skipping");
                return;
            }
        };

        match &msg {
            FeedMessage::Trade { .. } => {}
            FeedMessage::Ping => {
                debug!("Received feed ping");
                return;
            }
            FeedMessage::Error { msg } => {
                warn!(error = %msg, "Feed reported error");
                return;
            }
            FeedMessage::Other => {
                debug!("Ignoring non-trade feed message");
                return;
            }
        }

        if self.message_tx.send(msg).await.is_err() {
            warn!("Message receiver dropped");
        }
    }

    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;

        // base * 2^(attempt-1), capped
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = base.saturating_mul(1u64 << exponent);
        let delay = delay.min(max);

        Duration::from_millis(delay + rand_jitter())
    }
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(config: ConnectionConfig) -> ConnectionManager {
        let (tx, _rx) = mpsc::channel(1);
        ConnectionManager::new(config, Arc::new(Vec::<String>::new()), tx)
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0);
        assert_eq!(config.reconnect_base_delay_ms, 1000);
    }

    #[test]
    fn test_endpoint_appends_token() {
        let mut config = ConnectionConfig {
            url: "wss://ws.example.io".to_string(),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "wss://ws.example.io?token=abc");

        config.url = "wss://ws.example.io/?v=2".to_string();
        assert_eq!(config.endpoint(), "wss://ws.example.io/?v=2&token=abc");

        config.token = None;
        assert_eq!(config.endpoint(), "wss://ws.example.io/?v=2");
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let m = manager(ConnectionConfig {
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 5000,
            ..Default::default()
        });

        let first = m.calculate_backoff_delay(1).as_millis() as u64;
        assert!((1000..2000).contains(&first));

        let third = m.calculate_backoff_delay(3).as_millis() as u64;
        assert!((4000..5000).contains(&third));

        let tenth = m.calculate_backoff_delay(10).as_millis() as u64;
        assert!((5000..6000).contains(&tenth));
    }

    #[tokio::test]
    async fn test_trade_messages_are_forwarded_and_others_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let m = ConnectionManager::new(
            ConnectionConfig::default(),
            Arc::new(vec!["GME".to_string()]),
            tx,
        );

        m.handle_text_message(r#"{"type":"ping"}"#).await;
        m.handle_text_message("not json").await;
        m.handle_text_message(r#"{"type":"trade","data":[{"s":"GME","p":1,"v":1}]}"#)
            .await;

        let msg = rx.try_recv().unwrap();
        assert!(msg.is_trade());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_flag() {
        let m = manager(ConnectionConfig::default());
        assert!(!m.is_shutdown());
        m.shutdown();
        assert!(m.is_shutdown());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }
}
