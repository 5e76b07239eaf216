//! End-to-end pipeline tests.
//!
//! Runs the whole application against a mock feed, an in-memory store and
//! a scripted broker:
//! - Trade prints turn into an order once the price is inside the band
//! - Prices outside the band leave the preorder pending
//! - The REST quote bootstrap evaluates before any trade arrives
//! - A failed initial login stops startup

mod integration;
use integration::common::mock_ws::MockWsServer;
use integration::common::{preorder, wait_for_status};

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use preorder_bot::{AppConfig, AppError, Application};
use preorder_core::{OrderAction, PreorderBook, PreorderStatus};
use preorder_executor::mock::{MockBroker, MockCall, MockSessionFactory};
use preorder_persistence::{MemoryStore, PreorderStore};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn config(ws_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.feed.ws_url = ws_url;
    config.feed.token = "feed-token".to_string();
    config.feed.quote_url = String::new();
    config.feed.reconnect_base_delay_ms = 10;
    config.feed.reconnect_max_delay_ms = 50;
    config.aggregation.interval_ms = 100;
    config.broker.username = "trader".to_string();
    config.broker.password = "secret".to_string();
    config.broker.account_id = "ACC-1".to_string();
    config
}

fn gme_sell_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(PreorderBook::new(vec![preorder(
        "GME",
        OrderAction::Sell,
        dec!(25.00),
        "1147582",
    )])))
}

fn start(
    config: AppConfig,
    store: Arc<MemoryStore>,
    broker: Arc<MockBroker>,
) -> (CancellationToken, JoinHandle<Result<(), AppError>>) {
    let app = Application::with_components(
        config,
        store,
        Arc::new(MockSessionFactory::new(broker)),
    );
    let token = app.shutdown_token();
    let handle = tokio::spawn(app.run_until(std::future::pending()));
    (token, handle)
}

async fn wait_for_subscription(server: &MockWsServer) {
    timeout(Duration::from_secs(5), async {
        while server.received_messages().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("application should subscribe");
}

async fn stop(token: CancellationToken, handle: JoinHandle<Result<(), AppError>>) {
    token.cancel();
    let result = timeout(Duration::from_secs(10), handle)
        .await
        .expect("application should stop")
        .expect("application task should not panic");
    assert!(result.is_ok(), "run_until returned {result:?}");
}

/// A trade at 22 brings the SELL 25 preorder into its band and the order
/// is placed.
#[tokio::test]
async fn test_trade_creates_order() {
    let server = MockWsServer::start().await;
    let store = gme_sell_store();
    let broker = Arc::new(MockBroker::new());
    let (token, handle) = start(config(server.url()), store.clone(), broker.clone());

    wait_for_subscription(&server).await;
    assert_eq!(
        server.received_messages().await,
        vec![r#"{"type":"subscribe","symbol":"GME"}"#.to_string()]
    );
    assert_eq!(server.request_uris().await, vec!["/?token=feed-token".to_string()]);

    server.push(r#"{"type":"trade","data":[{"s":"GME","p":22.0,"v":100,"t":1}]}"#);

    assert!(
        wait_for_status(&store, 0, PreorderStatus::OrderCreated, Duration::from_secs(5)).await,
        "preorder should be marked as created"
    );
    let book = store.load().unwrap();
    assert!(book.preorders[0].order_created_utc.is_some());
    assert_eq!(
        broker.count(|c| matches!(c, MockCall::Confirm { .. })),
        1,
        "exactly one order placed"
    );

    stop(token, handle).await;
    server.shutdown().await;
}

/// A trade at 30 puts the SELL 25 limit below the band.
#[tokio::test]
async fn test_out_of_band_trade_leaves_pending() {
    let server = MockWsServer::start().await;
    let store = gme_sell_store();
    let broker = Arc::new(MockBroker::new());
    let (token, handle) = start(config(server.url()), store.clone(), broker.clone());

    wait_for_subscription(&server).await;
    server.push(r#"{"type":"trade","data":[{"s":"GME","p":30.0,"v":100,"t":1}]}"#);

    // several aggregation windows
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(store.load().unwrap().preorders[0].status, PreorderStatus::Pending);
    assert_eq!(broker.count(|c| matches!(c, MockCall::Check { .. })), 0);

    stop(token, handle).await;
    server.shutdown().await;
}

/// The startup quote alone is enough to place an in-band order.
#[tokio::test]
async fn test_quote_bootstrap_evaluates_before_trades() {
    let requested: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
    let seen = requested.clone();
    let router = Router::new().route(
        "/quote",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(params);
                Json(serde_json::json!({"c": 22.0, "h": 23.1, "l": 21.4, "pc": 21.9}))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let quote_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let server = MockWsServer::start().await;
    let store = gme_sell_store();
    let broker = Arc::new(MockBroker::new());
    let mut cfg = config(server.url());
    cfg.feed.quote_url = format!("http://{quote_addr}/quote");
    let (token, handle) = start(cfg, store.clone(), broker);

    assert!(
        wait_for_status(&store, 0, PreorderStatus::OrderCreated, Duration::from_secs(5)).await,
        "bootstrap quote should place the order"
    );

    let requested = requested.lock().unwrap().clone();
    assert_eq!(requested.len(), 1);
    assert_eq!(requested[0].get("symbol").map(String::as_str), Some("GME"));
    assert_eq!(requested[0].get("token").map(String::as_str), Some("feed-token"));

    stop(token, handle).await;
    server.shutdown().await;
}

/// Rejected credentials on the first login are fatal.
#[tokio::test]
async fn test_startup_fails_on_login_failure() {
    let server = MockWsServer::start().await;
    let store = gme_sell_store();
    let broker = Arc::new(MockBroker::new());
    broker.fail_next_connects(1);

    let app = Application::with_components(
        config(server.url()),
        store.clone(),
        Arc::new(MockSessionFactory::new(broker)),
    );
    let result = timeout(Duration::from_secs(5), app.run_until(std::future::pending()))
        .await
        .expect("startup should fail promptly");

    assert!(matches!(result, Err(AppError::Session(_))));
    assert_eq!(server.connection_count().await, 0, "feed never opened");
    assert_eq!(store.load().unwrap().preorders[0].status, PreorderStatus::Pending);
    server.shutdown().await;
}

/// An unwritable store path stops startup before any broker login.
#[tokio::test]
async fn test_startup_fails_on_bad_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config("ws://127.0.0.1:9".to_string());
    // a directory cannot be read as a preorder file
    cfg.store.path = dir.path().to_string_lossy().into_owned();

    let app = Application::new(cfg).unwrap();
    let result = timeout(Duration::from_secs(5), app.run_until(std::future::pending()))
        .await
        .expect("startup should fail promptly");

    assert!(matches!(result, Err(AppError::Persistence(_))));
}
