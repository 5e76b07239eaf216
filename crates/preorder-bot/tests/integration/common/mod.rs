//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mock_ws;

use preorder_core::{OrderAction, Preorder, PreorderStatus, Price, TimeInForce};
use preorder_persistence::{MemoryStore, PreorderStore};
use rust_decimal::Decimal;
use std::time::Duration;

/// Pending GOOD_TILL_CANCELED preorder.
pub fn preorder(symbol: &str, action: OrderAction, limit: Decimal, product_id: &str) -> Preorder {
    Preorder {
        symbol: symbol.to_string(),
        action,
        limit_price: Price::new(limit),
        size: 10,
        time_in_force: TimeInForce::GoodTillCanceled,
        product_id: product_id.to_string(),
        status: PreorderStatus::Pending,
        order_created_utc: None,
        extra: Default::default(),
    }
}

/// Poll `store` until the preorder at `index` has `status`.
pub async fn wait_for_status(
    store: &MemoryStore,
    index: usize,
    status: PreorderStatus,
    within: Duration,
) -> bool {
    tokio::time::timeout(within, async {
        loop {
            if let Ok(book) = store.load() {
                if book.preorders.get(index).map(|p| p.status) == Some(status) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

/// Poll `cond` every 20ms until it holds.
pub async fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(within, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}
