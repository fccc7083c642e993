//! Record store abstraction.
//!
//! A [`RecordStore`] executes statements against some backing storage. All
//! operations are async and take a `Cx` context for cancellation and timeout
//! support. Implementations must be `Send + Sync` for use across async
//! boundaries.

use std::future::Future;

use asupersync::{Cx, Outcome};
use trashcan_core::{Error, Record};

use crate::select::Select;
use crate::statement::{Delete, Insert, Update};

/// Storage backend the table layer issues statements to.
///
/// # Example
///
/// ```rust,ignore
/// let rows = store
///     .select(&cx, &Select::new("Articles").filter(Expr::col("id").eq(1)))
///     .await;
/// ```
pub trait RecordStore: Send + Sync {
    /// Execute a SELECT and return all matching rows as persisted records.
    fn select(&self, cx: &Cx, query: &Select)
    -> impl Future<Output = Outcome<Vec<Record>, Error>> + Send;

    /// Execute an INSERT and return the generated id, if the store generated one.
    fn insert(&self, cx: &Cx, stmt: &Insert)
    -> impl Future<Output = Outcome<Option<i64>, Error>> + Send;

    /// Execute an UPDATE and return the number of rows affected.
    fn update(&self, cx: &Cx, stmt: &Update) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Execute a DELETE and return the number of rows affected.
    fn delete(&self, cx: &Cx, stmt: &Delete) -> impl Future<Output = Outcome<u64, Error>> + Send;
}
