//! Table schema metadata.

use serde::{Deserialize, Serialize};

/// SQL data types understood by the table layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Integer,
    BigInt,
    Double,
    Boolean,
    VarChar(u32),
    Text,
    Blob,
    DateTime,
    Timestamp,
    Json,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    pub const fn is_integer(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::BigInt)
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl Column {
    /// A nullable column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Schema of one table: name, ordered columns and primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
}

impl TableSchema {
    /// Create a schema with no columns; the primary key defaults to `id`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: vec!["id".to_string()],
        }
    }

    /// Append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the (possibly composite) primary key.
    pub fn primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// The single integer primary key column, when the store may generate it.
    pub fn auto_increment_key(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [pk] => self
                .get_column(pk)
                .filter(|c| c.sql_type.is_integer())
                .map(|c| c.name.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn articles_users() -> TableSchema {
        TableSchema::new("composite_articles_users")
            .column(Column::new("article_id", SqlType::Integer).not_null())
            .column(Column::new("user_id", SqlType::Integer).not_null())
            .column(Column::new("trashed", SqlType::DateTime))
            .primary_key(["article_id", "user_id"])
    }

    #[test]
    fn composite_key_has_no_auto_increment() {
        let schema = articles_users();
        assert_eq!(schema.primary_key, vec!["article_id", "user_id"]);
        assert_eq!(schema.auto_increment_key(), None);
        assert!(schema.has_column("trashed"));
        assert!(!schema.has_column("deleted"));
    }

    #[test]
    fn integer_id_is_auto_increment() {
        let schema = TableSchema::new("users")
            .column(Column::new("id", SqlType::Integer).not_null())
            .column(Column::new("name", SqlType::VarChar(255)));
        assert_eq!(schema.auto_increment_key(), Some("id"));
        assert_eq!(schema.get_column("name").map(|c| c.sql_type.sql_name()), Some("VARCHAR(255)".to_string()));
    }
}
