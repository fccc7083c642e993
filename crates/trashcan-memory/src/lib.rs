//! In-memory record store for trashcan.
//!
//! `trashcan-memory` implements the `RecordStore` trait from `trashcan-query`
//! over tables held in process memory. It evaluates WHERE trees with SQL
//! three-valued logic, applies ORDER BY and LIMIT, and generates ids for
//! tables with a single integer primary key.
//!
//! Every statement is rendered to SQL (in the store's dialect) and logged at
//! trace level, and kept in a statement log tests can inspect.
//!
//! # Thread Safety
//!
//! `MemoryStore` is `Send + Sync` and cheap to clone; clones share the same
//! tables behind an `Arc<Mutex<_>>`.

pub mod store;

pub use store::MemoryStore;
