//! JSON file store for the preorder book.
//!
//! File layout:
//! ```json
//! {
//!     "preorders": [
//!         {
//!             "symbol": "GME",
//!             "action": "SELL",
//!             "limit_price": "25.00",
//!             ...
//!         }
//!     ]
//! }
//! ```
//!
//! Saves write a sibling temp file and rename it over the target, so a
//! crash mid-save leaves either the old or the new book, never a torn one.

use crate::error::{PersistenceError, PersistenceResult};
use parking_lot::Mutex;
use preorder_core::PreorderBook;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Repository for the preorder book.
pub trait PreorderStore: Send + Sync {
    /// Load the full book.
    fn load(&self) -> PersistenceResult<PreorderBook>;

    /// Replace the full book.
    fn save(&self, book: &PreorderBook) -> PersistenceResult<()>;
}

/// Preorder store backed by a pretty-printed JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes saves from this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preorders.json".to_string());
        self.path.with_file_name(format!(".{file_name}.tmp"))
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Serialize the book with 4-space indentation and a trailing newline.
fn to_pretty_json(book: &PreorderBook) -> PersistenceResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    book.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

impl PreorderStore for JsonFileStore {
    fn load(&self) -> PersistenceResult<PreorderBook> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let book: PreorderBook = serde_json::from_str(&content)?;

        for (index, preorder) in book.preorders.iter().enumerate() {
            preorder
                .validate()
                .map_err(|source| PersistenceError::InvalidRecord { index, source })?;
        }

        debug!(
            path = %self.path.display(),
            preorders = book.preorders.len(),
            pending = book.pending_count(),
            "Loaded preorder book"
        );
        Ok(book)
    }

    fn save(&self, book: &PreorderBook) -> PersistenceResult<()> {
        let bytes = to_pretty_json(book)?;
        let _guard = self.write_lock.lock();

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp).map_err(|e| self.io_error(e))?;
            file.write_all(&bytes).map_err(|e| self.io_error(e))?;
            file.sync_all().map_err(|e| self.io_error(e))?;
        }
        fs::rename(&temp, &self.path).map_err(|e| self.io_error(e))?;

        info!(
            path = %self.path.display(),
            preorders = book.preorders.len(),
            pending = book.pending_count(),
            "Saved preorder book"
        );
        Ok(())
    }
}
