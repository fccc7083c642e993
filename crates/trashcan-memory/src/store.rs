//! `MemoryStore` implementation.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use asupersync::{Cx, Outcome};
use trashcan_core::{Error, QueryErrorKind, Record, Result, TableSchema, Value};
use trashcan_query::{Delete, Dialect, Expr, Insert, OrderDirection, RecordStore, Select, Update};

struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Record>,
    next_id: i64,
}

impl MemoryTable {
    fn check_column(&self, column: &str, sql: &str) -> Result<()> {
        if self.schema.has_column(column) {
            Ok(())
        } else {
            Err(Error::query(
                QueryErrorKind::NotFound,
                format!("table {} has no column named {}", self.schema.name, column),
                Some(sql.to_string()),
            ))
        }
    }

    fn key_of(&self, row: &Record) -> Vec<Value> {
        row.extract(&self.schema.primary_key)
    }
}

#[derive(Default)]
struct MemoryInner {
    tables: HashMap<String, MemoryTable>,
    log: Vec<String>,
}

/// A `RecordStore` over tables held in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    dialect: Dialect,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        let mut tables: Vec<_> = inner.tables.keys().cloned().collect();
        tables.sort();
        f.debug_struct("MemoryStore")
            .field("tables", &tables)
            .field("dialect", &self.dialect)
            .finish()
    }
}

fn not_found(table: &str, sql: &str) -> Error {
    Error::query(
        QueryErrorKind::NotFound,
        format!("no such table: {table}"),
        Some(sql.to_string()),
    )
}

fn with_sql(err: Error, sql: &str) -> Error {
    match err {
        Error::Query(mut q) if q.sql.is_none() => {
            q.sql = Some(sql.to_string());
            Error::Query(q)
        }
        other => other,
    }
}

/// NULLs sort first, as in SQLite.
fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.sql_cmp(b).unwrap_or(Ordering::Equal),
    }
}

fn matches(cond: Option<&Expr>, row: &Record, qualifiers: &[&str]) -> Result<bool> {
    match cond {
        Some(expr) => expr.matches(row, qualifiers),
        None => Ok(true),
    }
}

/// Evaluate the condition for every row before anything is modified, so a
/// failing predicate leaves the table untouched.
fn matching_rows(rows: &[Record], cond: Option<&Expr>, qualifiers: &[&str], sql: &str) -> Result<Vec<bool>> {
    rows.iter()
        .map(|row| matches(cond, row, qualifiers).map_err(|e| with_sql(e, sql)))
        .collect()
}

impl MemoryStore {
    /// Create an empty store rendering SQL in the PostgreSQL dialect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store rendering SQL in the given dialect.
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a table from its schema.
    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut inner = self.lock();
        if inner.tables.contains_key(&schema.name) {
            return Err(Error::query(
                QueryErrorKind::Constraint,
                format!("table {} already exists", schema.name),
                None,
            ));
        }
        tracing::debug!(table = %schema.name, columns = schema.columns.len(), "Creating memory table");
        inner.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    /// Insert fixture rows into a table.
    pub fn load_fixtures(&self, table: &str, rows: impl IntoIterator<Item = Record>) -> Result<()> {
        for row in rows {
            let insert = Insert::new(table).values(
                row.values()
                    .map(|(k, v)| (k.to_string(), v.clone())),
            );
            self.insert_sync(&insert)?;
        }
        Ok(())
    }

    /// Snapshot of every row of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Record>> {
        let inner = self.lock();
        inner
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| not_found(table, ""))
    }

    /// SQL of every statement executed so far.
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_statements(&self) {
        self.lock().log.clear();
    }

    fn record(&self, inner: &mut MemoryInner, sql: &str, params: &[Value]) {
        tracing::trace!(sql = %sql, params = params.len(), "Executing memory statement");
        inner.log.push(sql.to_string());
    }

    /// Execute a SELECT synchronously.
    pub fn select_sync(&self, query: &Select) -> Result<Vec<Record>> {
        let (sql, params) = query.build_with_dialect(self.dialect);
        let mut inner = self.lock();
        self.record(&mut inner, &sql, &params);

        let table = inner
            .tables
            .get(query.source_table())
            .ok_or_else(|| not_found(query.source_table(), &sql))?;
        let qualifiers = [query.source_table(), query.table()];

        let mut rows = Vec::new();
        for row in &table.rows {
            if matches(query.where_expr(), row, &qualifiers).map_err(|e| with_sql(e, &sql))? {
                rows.push(row.clone());
            }
        }

        for order in query.order() {
            table.check_column(order.field(), &sql)?;
        }
        rows.sort_by(|a, b| {
            for order in query.order() {
                let field = order.field();
                let left = a.get(field).unwrap_or(&Value::Null);
                let right = b.get(field).unwrap_or(&Value::Null);
                let ord = match order.direction() {
                    OrderDirection::Asc => compare_for_sort(left, right),
                    OrderDirection::Desc => compare_for_sort(right, left),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        if let Some(limit) = query.limit_value() {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        tracing::debug!(table = query.table(), rows = rows.len(), "Memory select");
        Ok(rows)
    }

    /// Execute an INSERT synchronously, returning the generated id.
    pub fn insert_sync(&self, stmt: &Insert) -> Result<Option<i64>> {
        let (sql, params) = stmt.build_with_dialect(self.dialect);
        let mut inner = self.lock();
        self.record(&mut inner, &sql, &params);

        let table = inner
            .tables
            .get_mut(stmt.table())
            .ok_or_else(|| not_found(stmt.table(), &sql))?;

        let mut row = Record::persisted(
            table
                .schema
                .column_names()
                .map(|name| (name.to_string(), Value::Null)),
        );
        for (column, value) in stmt.columns() {
            table.check_column(column, &sql)?;
            row.set_clean(column.clone(), value.clone());
        }

        let mut generated = None;
        if let Some(pk) = table.schema.auto_increment_key() {
            match row.get(pk).and_then(Value::as_i64) {
                Some(id) => table.next_id = table.next_id.max(id.saturating_add(1)),
                None => {
                    let id = table.next_id;
                    table.next_id = id.saturating_add(1);
                    row.set_clean(pk, Value::BigInt(id));
                    generated = Some(id);
                }
            }
        }

        let key = table.key_of(&row);
        if key.iter().any(Value::is_null) {
            return Err(Error::query(
                QueryErrorKind::Constraint,
                format!("NOT NULL constraint failed: {}.{}", table.schema.name, table.schema.primary_key.join(", ")),
                Some(sql),
            ));
        }
        let duplicate = table
            .rows
            .iter()
            .any(|existing| {
                table
                    .key_of(existing)
                    .iter()
                    .zip(&key)
                    .all(|(a, b)| a.sql_eq(b) == Some(true))
            });
        if duplicate {
            return Err(Error::query(
                QueryErrorKind::Constraint,
                format!("UNIQUE constraint failed: {}", table.schema.name),
                Some(sql),
            ));
        }

        table.rows.push(row);
        Ok(generated)
    }

    /// Execute an UPDATE synchronously, returning rows affected.
    pub fn update_sync(&self, stmt: &Update) -> Result<u64> {
        let (sql, params) = stmt.build_with_dialect(self.dialect);
        let mut inner = self.lock();
        self.record(&mut inner, &sql, &params);

        let table = inner
            .tables
            .get_mut(stmt.table())
            .ok_or_else(|| not_found(stmt.table(), &sql))?;
        for (column, _) in stmt.assignments() {
            table.check_column(column, &sql)?;
        }

        let mut qualifiers = vec![stmt.table()];
        qualifiers.extend(stmt.table_alias());
        let hits = matching_rows(&table.rows, stmt.where_expr(), &qualifiers, &sql)?;
        let mut affected = 0;
        for (row, hit) in table.rows.iter_mut().zip(hits) {
            if hit {
                for (column, value) in stmt.assignments() {
                    row.set_clean(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        tracing::debug!(table = stmt.table(), affected, "Memory update");
        Ok(affected)
    }

    /// Execute a DELETE synchronously, returning rows affected.
    pub fn delete_sync(&self, stmt: &Delete) -> Result<u64> {
        let (sql, params) = stmt.build_with_dialect(self.dialect);
        let mut inner = self.lock();
        self.record(&mut inner, &sql, &params);

        let table = inner
            .tables
            .get_mut(stmt.table())
            .ok_or_else(|| not_found(stmt.table(), &sql))?;

        let mut qualifiers = vec![stmt.table()];
        qualifiers.extend(stmt.table_alias());
        let hits = matching_rows(&table.rows, stmt.where_expr(), &qualifiers, &sql)?;
        let affected = hits.iter().filter(|hit| **hit).count() as u64;
        let mut hits = hits.into_iter();
        table.rows.retain(|_| !hits.next().unwrap_or(false));
        tracing::debug!(table = stmt.table(), affected, "Memory delete");
        Ok(affected)
    }
}

impl RecordStore for MemoryStore {
    fn select(&self, _cx: &Cx, query: &Select) -> impl Future<Output = Outcome<Vec<Record>, Error>> + Send {
        let result = self.select_sync(query);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(&self, _cx: &Cx, stmt: &Insert) -> impl Future<Output = Outcome<Option<i64>, Error>> + Send {
        let result = self.insert_sync(stmt);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn update(&self, _cx: &Cx, stmt: &Update) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.update_sync(stmt);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn delete(&self, _cx: &Cx, stmt: &Delete) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.delete_sync(stmt);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use trashcan_core::{Column, SqlType};
    use trashcan_query::OrderBy;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_table(
                TableSchema::new("articles")
                    .column(Column::new("id", SqlType::Integer).not_null())
                    .column(Column::new("title", SqlType::VarChar(255)))
                    .column(Column::new("trashed", SqlType::DateTime)),
            )
            .expect("create table");
        store
            .load_fixtures(
                "articles",
                vec![
                    Record::new().with("title", "First"),
                    Record::new().with("title", "Second").with("trashed", Value::Timestamp(10)),
                    Record::new().with("title", "Third").with("trashed", Value::Timestamp(20)),
                ],
            )
            .expect("load fixtures");
        store
    }

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(value) => value,
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
    }

    #[test]
    fn generates_ids_and_fills_missing_columns() {
        let store = store();
        let rows = store.rows("articles").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("id"), Some(&Value::BigInt(1)));
        assert_eq!(rows[0].get("trashed"), Some(&Value::Null));
        assert!(rows[0].is_persisted());
        assert!(!rows[0].is_dirty());

        let id = store
            .insert_sync(&Insert::new("articles").value("id", 10).value("title", "X"))
            .unwrap();
        assert_eq!(id, None);
        let id = store.insert_sync(&Insert::new("articles").value("title", "Y")).unwrap();
        assert_eq!(id, Some(11));
    }

    #[test]
    fn largest_explicit_id_exhausts_the_sequence() {
        let store = store();
        let id = store
            .insert_sync(&Insert::new("articles").value("id", i64::MAX).value("title", "Last"))
            .unwrap();
        assert_eq!(id, None);

        // the sequence stays at the maximum, so the next generated key collides
        let next = store.insert_sync(&Insert::new("articles").value("title", "Overflow"));
        assert!(matches!(next, Err(Error::Query(q)) if q.kind == QueryErrorKind::Constraint));
        assert_eq!(store.rows("articles").unwrap().len(), 4);
    }

    #[test]
    fn rejects_duplicate_keys_and_unknown_columns() {
        let store = store();
        let dup = store.insert_sync(&Insert::new("articles").value("id", 1));
        assert!(matches!(dup, Err(Error::Query(q)) if q.kind == QueryErrorKind::Constraint));
        let unknown = store.insert_sync(&Insert::new("articles").value("nope", 1));
        assert!(unknown.unwrap_err().is_not_found());
    }

    #[test]
    fn select_filters_sorts_and_limits() {
        let store = store();
        let query = Select::new("Articles")
            .from_table("articles")
            .filter(Expr::qualified("Articles", "trashed").is_not_null())
            .order_by(OrderBy::desc("Articles.id"))
            .limit(1);
        let rows = store.select_sync(&query).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title"), Some(&Value::from("Third")));

        let all = store
            .select_sync(&Select::new("Articles").from_table("articles").order_by(OrderBy::asc("trashed")))
            .unwrap();
        // NULL first
        assert_eq!(all[0].get("title"), Some(&Value::from("First")));
    }

    #[test]
    fn unknown_table_is_not_found() {
        let store = store();
        let err = store.select_sync(&Select::new("Nope")).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.sql().is_some_and(|sql| sql.contains("\"Nope\"")));
    }

    #[test]
    fn raw_fragments_are_unsupported() {
        let store = store();
        let err = store
            .select_sync(&Select::new("articles").filter(Expr::raw("1 = 1")))
            .unwrap_err();
        assert!(matches!(err, Error::Query(q) if q.kind == QueryErrorKind::Unsupported));
    }

    #[test]
    fn update_and_delete_through_trait() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let store = store();

        rt.block_on(async {
            let restored = unwrap_outcome(
                store
                    .update(
                        &cx,
                        &Update::new("articles")
                            .set("trashed", Value::Null)
                            .filter(Expr::col("trashed").is_not_null()),
                    )
                    .await,
            );
            assert_eq!(restored, 2);

            let purged = unwrap_outcome(
                store
                    .delete(
                        &cx,
                        &Delete::new("articles")
                            .alias("Articles")
                            .filter(Expr::qualified("Articles", "id").eq(1)),
                    )
                    .await,
            );
            assert_eq!(purged, 1);

            let left = unwrap_outcome(store.select(&cx, &Select::new("articles")).await);
            assert_eq!(left.len(), 2);
        });

        let log = store.statements();
        assert!(log.iter().any(|sql| sql.starts_with("UPDATE \"articles\" SET")));
        assert!(log.iter().any(|sql| sql.starts_with("DELETE FROM \"articles\" AS \"Articles\"")));
    }
}
