//! SELECT query builder.

use serde_json::{Map, Value as JsonValue};
use trashcan_core::Value;

use crate::clause::{Limit, OrderBy, Where};
use crate::expr::{Dialect, Expr};

/// Named finder a query was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Finder {
    /// Every row the table's own filters allow
    #[default]
    All,
    /// Trashed rows only
    OnlyTrashed,
    /// Active and trashed rows
    WithTrashed,
    /// Any other finder name
    Named(String),
}

impl Finder {
    /// Parse a finder name: `all`, `onlyTrashed`, `withTrashed` or any other name.
    pub fn parse(name: &str) -> Self {
        match name {
            "all" => Finder::All,
            "onlyTrashed" => Finder::OnlyTrashed,
            "withTrashed" => Finder::WithTrashed,
            other => Finder::Named(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Finder::All => "all",
            Finder::OnlyTrashed => "onlyTrashed",
            Finder::WithTrashed => "withTrashed",
            Finder::Named(name) => name,
        }
    }
}

/// Options carried by a query into `beforeFind` listeners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Do not add the implicit "not trashed" condition
    pub skip_add_trash_condition: bool,
    /// Free-form caller options
    pub extra: Map<String, JsonValue>,
}

/// A SELECT query over one table alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Table alias the query was built for
    table: String,
    /// Physical table name, when it differs from the alias
    source: Option<String>,
    where_clause: Option<Where>,
    order_by: Vec<OrderBy>,
    limit: Option<Limit>,
    finder: Finder,
    /// Set once a finder has taken control of the trash condition
    trash_scope: bool,
    contain: Vec<String>,
    options: QueryOptions,
    primary: bool,
}

impl Select {
    /// Create a new SELECT query for a table alias.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            source: None,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            finder: Finder::All,
            trash_scope: false,
            contain: Vec::new(),
            options: QueryOptions::default(),
            primary: true,
        }
    }

    /// Set the physical table name.
    pub fn from_table(mut self, name: impl Into<String>) -> Self {
        self.source = Some(name.into());
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.and_where(expr);
        self
    }

    /// Add an OR WHERE condition.
    pub fn or_filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.or(expr),
            None => Where::new(expr),
        });
        self
    }

    /// AND a condition onto the existing WHERE clause in place.
    pub fn and_where(&mut self, expr: Expr) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
    }

    /// Add ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self
    }

    /// Use a named finder.
    pub fn find(mut self, finder: Finder) -> Self {
        self.finder = finder;
        self
    }

    /// Eager-load an association by name.
    pub fn contain(mut self, association: impl Into<String>) -> Self {
        self.contain.push(association.into());
        self
    }

    /// Skip the implicit "not trashed" condition.
    pub fn skip_add_trash_condition(mut self, value: bool) -> Self {
        self.options.skip_add_trash_condition = value;
        self
    }

    /// Set a free-form query option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.extra.insert(key.into(), value.into());
        self
    }

    /// Mark the query as issued by the table layer rather than the caller.
    pub fn secondary(mut self) -> Self {
        self.primary = false;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Physical table name (falls back to the alias).
    pub fn source_table(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.table)
    }

    pub fn where_clause(&self) -> Option<&Where> {
        self.where_clause.as_ref()
    }

    pub fn where_expr(&self) -> Option<&Expr> {
        self.where_clause.as_ref().map(Where::expr)
    }

    pub fn order(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit.map(|l| l.0)
    }

    pub fn finder(&self) -> &Finder {
        &self.finder
    }

    pub fn contained(&self) -> &[String] {
        &self.contain
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn has_trash_scope(&self) -> bool {
        self.trash_scope
    }

    pub fn set_trash_scope(&mut self, value: bool) {
        self.trash_scope = value;
    }

    /// Build the SQL query and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the SQL query and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!(
            "SELECT * FROM {} AS {}",
            dialect.quote_identifier(self.source_table()),
            dialect.quote_identifier(&self.table)
        );
        let mut params = Vec::new();

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        if !self.order_by.is_empty() {
            let orders: Vec<_> = self.order_by.iter().map(OrderBy::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        if let Some(Limit(n)) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_full_select() {
        let query = Select::new("Articles")
            .from_table("articles")
            .filter(Expr::qualified("Articles", "id").eq(1))
            .filter(Expr::qualified("Articles", "trashed").is_null())
            .order_by(OrderBy::desc("Articles.id"))
            .limit(5);
        let (sql, params) = query.build();
        assert_eq!(
            sql,
            "SELECT * FROM \"articles\" AS \"Articles\" WHERE \"Articles\".\"id\" = $1 AND \"Articles\".\"trashed\" IS NULL ORDER BY Articles.id DESC LIMIT 5"
        );
        assert_eq!(params, vec![Value::Int(1)]);
    }

    #[test]
    fn source_defaults_to_alias() {
        let query = Select::new("Users");
        assert_eq!(query.source_table(), "Users");
        assert_eq!(query.build().0, "SELECT * FROM \"Users\" AS \"Users\"");
        assert!(query.where_expr().is_none());
        assert!(query.is_primary());
        assert!(!query.secondary().is_primary());
    }

    #[test]
    fn finder_names_round_trip() {
        for name in ["all", "onlyTrashed", "withTrashed", "published"] {
            assert_eq!(Finder::parse(name).name(), name);
        }
    }

    #[test]
    fn options_and_flags() {
        let mut query = Select::new("Comments")
            .skip_add_trash_condition(true)
            .option("deleteOptions", true)
            .contain("Users");
        assert!(query.options().skip_add_trash_condition);
        assert_eq!(query.contained(), ["Users".to_string()]);
        assert!(!query.has_trash_scope());
        query.set_trash_scope(true);
        assert!(query.has_trash_scope());
    }
}
