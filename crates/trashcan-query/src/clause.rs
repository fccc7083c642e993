//! SQL clause types (WHERE, ORDER BY, LIMIT)

use crate::expr::{Dialect, Expr};
use trashcan_core::Value;

/// WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    expr: Expr,
}

impl Where {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add an OR condition.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    /// The condition tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Render the condition (without the `WHERE` keyword).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::Postgres, 0)
    }

    /// Build the WHERE clause with a dialect and parameter offset.
    pub fn build_with_dialect(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build_with_dialect(dialect, &mut params, offset);
        (sql, params)
    }
}

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    /// Ascending on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Descending on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// The column as written, possibly qualified (`Alias.field`).
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The column without its qualifier.
    pub fn field(&self) -> &str {
        self.column
            .rsplit_once('.')
            .map_or(self.column.as_str(), |(_, f)| f)
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn to_sql(&self) -> String {
        let mut sql = self.column.clone();
        sql.push_str(match self.direction {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        });
        sql
    }
}

/// LIMIT clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub u64);
