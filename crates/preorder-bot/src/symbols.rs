//! Feed subscriptions derived from the preorder store.

use preorder_persistence::PreorderStore;
use preorder_ws::SymbolSource;
use std::sync::Arc;
use tracing::warn;

/// Every distinct symbol in the store, read fresh on each connect.
pub struct StoreSymbols {
    store: Arc<dyn PreorderStore>,
}

impl StoreSymbols {
    pub fn new(store: Arc<dyn PreorderStore>) -> Self {
        Self { store }
    }
}

impl SymbolSource for StoreSymbols {
    fn symbols(&self) -> Vec<String> {
        match self.store.load() {
            Ok(book) => book.symbols().into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Cannot read preorder store, subscribing to nothing");
                Vec::new()
            }
        }
    }
}
