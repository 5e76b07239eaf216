//! In-memory preorder store for tests and dry runs.

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::PreorderStore;
use parking_lot::Mutex;
use preorder_core::PreorderBook;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Preorder store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    book: Mutex<PreorderBook>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new(book: PreorderBook) -> Self {
        Self {
            book: Mutex::new(book),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Current contents.
    pub fn snapshot(&self) -> PreorderBook {
        self.book.lock().clone()
    }

    /// Replace the contents, as an operator editing the file would.
    pub fn replace(&self, book: PreorderBook) {
        *self.book.lock() = book;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl PreorderStore for MemoryStore {
    fn load(&self) -> PersistenceResult<PreorderBook> {
        Ok(self.book.lock().clone())
    }

    fn save(&self, book: &PreorderBook) -> PersistenceResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "saves disabled".to_string(),
            ));
        }
        *self.book.lock() = book.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
