//! Query building and the record store contract for trashcan.
//!
//! `trashcan-query` provides the predicate tree (`Expr`), the statements the
//! table layer issues (`Select`, `Insert`, `Update`, `Delete`) and the
//! `RecordStore` trait drivers implement.
//!
//! Expressions render to SQL for PostgreSQL, SQLite and MySQL placeholder
//! styles, can be walked to inspect which columns a condition touches, and
//! can be evaluated against a record for in-process stores.

pub mod clause;
pub mod expr;
pub mod select;
pub mod statement;
pub mod store;

pub use clause::{Limit, OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Dialect, Expr};
pub use select::{Finder, QueryOptions, Select};
pub use statement::{Delete, Insert, Update};
pub use store::RecordStore;
