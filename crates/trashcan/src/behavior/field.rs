//! Trash field resolution.

use trashcan_core::{Error, Result, TableSchema};

use super::TrashBehavior;
use crate::defaults;

/// Column names probed when no field is configured, in order.
pub const CANDIDATE_FIELDS: [&str; 2] = ["deleted", "trashed"];

impl TrashBehavior {
    /// Resolve the trash field of the table `alias` with schema `schema`.
    ///
    /// Order: configured field, a `deleted` or `trashed` column, the
    /// process-wide default. The first result is cached for the lifetime of
    /// the behavior.
    pub fn resolve_field(&self, alias: &str, schema: &TableSchema) -> Result<&str> {
        if let Some(field) = self.field.get() {
            return Ok(field);
        }

        let resolved = if let Some(field) = self.config.configured_field() {
            field.to_string()
        } else if let Some(column) = CANDIDATE_FIELDS.iter().find(|c| schema.has_column(c)) {
            (*column).to_string()
        } else if let Some(field) = defaults::default_trash_field() {
            field
        } else {
            return Err(Error::MissingFieldConfig {
                table: alias.to_string(),
            });
        };

        tracing::debug!(table = alias, field = %resolved, "Resolved trash field");
        Ok(self.field.get_or_init(|| resolved))
    }
}

/// The trash field of `table`, optionally qualified as `Alias.field`.
pub fn trash_field(behavior: &TrashBehavior, alias: &str, schema: &TableSchema, aliased: bool) -> Result<String> {
    let field = behavior.resolve_field(alias, schema)?;
    Ok(if aliased {
        format!("{alias}.{field}")
    } else {
        field.to_string()
    })
}
