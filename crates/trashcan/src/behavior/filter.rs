//! Read filtering.
//!
//! A trash-enabled table hides trashed rows from every query unless the query
//! already constrains the trash field, uses the `onlyTrashed` or `withTrashed`
//! finder, or sets `skip_add_trash_condition`.

use trashcan_core::{Error, Result};
use trashcan_query::{Expr, Finder, Select};

use crate::table::{SupportsTrash, Table};

/// Apply the query's finder.
///
/// `OnlyTrashed` adds `Alias.field IS NOT NULL`; `WithTrashed` suppresses the
/// implicit condition. Both take over the trash scope of the query, and both
/// are only available on tables with the trash behavior.
pub fn apply_finder(table: &Table, query: &mut Select) -> Result<()> {
    let finder = query.finder().clone();
    match finder {
        Finder::All => Ok(()),
        Finder::OnlyTrashed | Finder::WithTrashed if table.supports_trash() => {
            if finder == Finder::OnlyTrashed {
                let field = table.trash_field(true)?;
                query.and_where(Expr::field(&field).is_not_null());
            } else {
                query.options_mut().skip_add_trash_condition = true;
            }
            query.set_trash_scope(true);
            tracing::debug!(table = %table.alias(), finder = finder.name(), "Applied trash finder");
            Ok(())
        }
        other => Err(Error::UnknownFinder {
            table: table.alias().to_string(),
            finder: other.name().to_string(),
        }),
    }
}

/// `Model.beforeFind` handler: AND `Alias.field IS NULL` onto `query`.
pub fn add_trash_condition(table: &Table, query: &mut Select) -> Result<()> {
    if query.table() != table.alias() {
        return Ok(());
    }
    if query.has_trash_scope() || query.options().skip_add_trash_condition {
        tracing::trace!(table = %table.alias(), "Trash condition suppressed");
        return Ok(());
    }

    let field = table.trash_field(false)?;
    if query
        .where_expr()
        .is_some_and(|expr| expr.references_column(table.alias(), &field))
    {
        tracing::debug!(
            table = %table.alias(),
            field = %field,
            "Query already constrains the trash field"
        );
        return Ok(());
    }

    query.and_where(Expr::qualified(table.alias(), field).is_null());
    tracing::debug!(table = %table.alias(), "Added trash condition");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::TrashConfig;
    use trashcan_core::{Column, SqlType, TableSchema, Value};

    fn articles() -> Table {
        Table::new(
            "Articles",
            TableSchema::new("articles")
                .column(Column::new("id", SqlType::Integer))
                .column(Column::new("trashed", SqlType::DateTime)),
        )
        .with_trash(TrashConfig::new())
        .unwrap()
    }

    fn filtered(query: Select) -> String {
        let mut query = query;
        let table = articles();
        apply_finder(&table, &mut query).unwrap();
        add_trash_condition(&table, &mut query).unwrap();
        query.where_expr().map(Expr::to_sql).unwrap_or_default()
    }

    #[test]
    fn adds_condition_by_default() {
        assert_eq!(
            filtered(Select::new("Articles")),
            "\"Articles\".\"trashed\" IS NULL"
        );
        assert_eq!(
            filtered(Select::new("Articles").filter(Expr::qualified("Articles", "id").eq(1))),
            "\"Articles\".\"id\" = $1 AND \"Articles\".\"trashed\" IS NULL"
        );
    }

    #[test]
    fn explicit_trash_conditions_are_left_alone() {
        let cases = [
            Expr::qualified("Articles", "trashed").is_not_null(),
            Expr::col("trashed").gt(Value::Timestamp(5)),
            Expr::col("trashed").between(Value::Timestamp(1), Value::Timestamp(9)),
            Expr::col("id")
                .eq(1)
                .or(Expr::col("id").eq(2).and(Expr::col("trashed").is_null())),
            Expr::col("trashed"),
        ];
        for cond in cases {
            let expected = cond.to_sql();
            assert_eq!(filtered(Select::new("Articles").filter(cond)), expected);
        }
    }

    #[test]
    fn other_alias_qualifier_does_not_count() {
        let sql = filtered(Select::new("Articles").filter(Expr::qualified("Comments", "trashed").is_null()));
        assert!(sql.ends_with("AND \"Articles\".\"trashed\" IS NULL"));
    }

    #[test]
    fn finders_take_over_trash_scope() {
        assert_eq!(
            filtered(Select::new("Articles").find(Finder::OnlyTrashed)),
            "\"Articles\".\"trashed\" IS NOT NULL"
        );
        assert_eq!(filtered(Select::new("Articles").find(Finder::WithTrashed)), "");
        assert_eq!(
            filtered(Select::new("Articles").skip_add_trash_condition(true)),
            ""
        );
    }

    #[test]
    fn trash_finders_need_the_behavior() {
        let plain = Table::new("Users", TableSchema::new("users"));
        let mut query = Select::new("Users").find(Finder::WithTrashed);
        assert!(matches!(
            apply_finder(&plain, &mut query),
            Err(Error::UnknownFinder { finder, .. }) if finder == "withTrashed"
        ));
        let mut named = Select::new("Articles").find(Finder::parse("published"));
        assert!(apply_finder(&articles(), &mut named).is_err());
    }
}
