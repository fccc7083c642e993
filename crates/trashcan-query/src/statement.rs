//! INSERT, UPDATE and DELETE statements.

use trashcan_core::Value;

use crate::clause::Where;
use crate::expr::{Dialect, Expr};

/// INSERT of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    values: Vec<(String, Value)>,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Set a column value.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Set several column values.
    pub fn values(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.values
    }

    /// SQL and parameters in the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let columns: Vec<_> = self
            .values
            .iter()
            .map(|(name, _)| dialect.quote_identifier(name))
            .collect();
        let params: Vec<_> = self.values.iter().map(|(_, v)| v.clone()).collect();
        let placeholders: Vec<_> = (1..=params.len()).map(|i| dialect.placeholder(i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_identifier(&self.table),
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, params)
    }
}

/// UPDATE of every row matching a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    alias: Option<String>,
    set: Vec<(String, Value)>,
    where_clause: Option<Where>,
}

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            set: Vec::new(),
            where_clause: None,
        }
    }

    /// Name the table so qualified conditions can refer to it.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Assign a column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    /// Assign several columns.
    pub fn set_all(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.set.extend(values);
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Add a WHERE condition when one is given.
    pub fn filter_opt(self, expr: Option<Expr>) -> Self {
        match expr {
            Some(expr) => self.filter(expr),
            None => self,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn table_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.set
    }

    pub fn where_expr(&self) -> Option<&Expr> {
        self.where_clause.as_ref().map(Where::expr)
    }

    /// SQL and parameters in the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_clauses: Vec<_> = self
            .set
            .iter()
            .map(|(name, value)| {
                params.push(value.clone());
                format!(
                    "{} = {}",
                    dialect.quote_identifier(name),
                    dialect.placeholder(params.len())
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {}{} SET {}",
            dialect.quote_identifier(&self.table),
            alias_sql(dialect, self.alias.as_deref()),
            set_clauses.join(", ")
        );

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        (sql, params)
    }
}

/// DELETE of every row matching a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    alias: Option<String>,
    where_clause: Option<Where>,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            where_clause: None,
        }
    }

    /// Name the table so qualified conditions can refer to it.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn table_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn where_expr(&self) -> Option<&Expr> {
        self.where_clause.as_ref().map(Where::expr)
    }

    /// SQL and parameters in the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!(
            "DELETE FROM {}{}",
            dialect.quote_identifier(&self.table),
            alias_sql(dialect, self.alias.as_deref())
        );
        let mut params = Vec::new();

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }

        (sql, params)
    }
}

fn alias_sql(dialect: Dialect, alias: Option<&str>) -> String {
    alias.map_or_else(String::new, |a| format!(" AS {}", dialect.quote_identifier(a)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql() {
        let (sql, params) = Insert::new("comments")
            .value("article_id", 1)
            .value("body", "hi")
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(
            sql,
            "INSERT INTO \"comments\" (\"article_id\", \"body\") VALUES (?1, ?2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn update_offsets_where_params() {
        let (sql, params) = Update::new("articles")
            .set("trashed", Value::Timestamp(7))
            .filter(Expr::col("id").eq(2))
            .build();
        assert_eq!(sql, "UPDATE \"articles\" SET \"trashed\" = $1 WHERE \"id\" = $2");
        assert_eq!(params, vec![Value::Timestamp(7), Value::Int(2)]);
    }

    #[test]
    fn update_without_condition_touches_all_rows() {
        let update = Update::new("articles")
            .set("trashed", Value::Null)
            .filter_opt(None);
        assert!(update.where_expr().is_none());
        assert_eq!(update.build().0, "UPDATE \"articles\" SET \"trashed\" = $1");
    }

    #[test]
    fn delete_sql() {
        let (sql, _) = Delete::new("articles")
            .filter(Expr::col("trashed").is_not_null())
            .build_with_dialect(Dialect::Mysql);
        assert_eq!(sql, "DELETE FROM `articles` WHERE `trashed` IS NOT NULL");

        let aliased = Delete::new("articles")
            .alias("Articles")
            .filter(Expr::qualified("Articles", "id").eq(1));
        assert_eq!(aliased.table_alias(), Some("Articles"));
        assert_eq!(
            aliased.build().0,
            "DELETE FROM \"articles\" AS \"Articles\" WHERE \"Articles\".\"id\" = $1"
        );
    }
}
