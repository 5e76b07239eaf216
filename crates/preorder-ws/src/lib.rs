//! Market-data WebSocket client.
//!
//! Provides a reconnecting trade-stream connection with:
//! - Automatic reconnection with exponential backoff
//! - Re-subscription of every watched symbol on each connect
//! - Idle-read detection
//! - Channel-based message routing

pub mod connection;
pub mod error;
pub mod message;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, SymbolSource};
pub use error::{WsError, WsResult};
pub use message::{FeedMessage, SubscribeRequest, TradePrint};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket or HTTPS connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
