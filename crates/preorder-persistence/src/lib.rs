//! Preorder persistence.
//!
//! The store is a repository with whole-book load and save. Every save
//! replaces the full file; concurrent editors resolve by last writer wins.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use memory::MemoryStore;
pub use store::{JsonFileStore, PreorderStore};
