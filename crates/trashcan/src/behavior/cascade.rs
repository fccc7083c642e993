//! Propagation of trash and restore along dependent associations.
//!
//! An association is followed when it is a `HasOne` or `HasMany` owned by
//! the table, marked `dependent` with `cascade_callbacks`, and its target
//! table has the trash behavior.
//!
//! Every walk carries a [`CascadeWalk`] so that records (and, in bulk mode,
//! tables) already handled are skipped when associations point both ways.

use std::collections::HashSet;

use asupersync::{Cx, Outcome};
use trashcan_core::{Association, Error, OperationOptions, Record, try_outcome, try_result};
use trashcan_query::{Finder, RecordStore, Select};

use crate::session::{BoxFuture, Session, key_condition};
use crate::table::{SupportsTrash, Table};

/// Visited set of one cascade.
#[derive(Debug, Clone, Default)]
pub struct CascadeWalk {
    records: HashSet<(String, String)>,
    tables: HashSet<String>,
}

impl CascadeWalk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark record `key` of `table` as visited. `false` if it already was.
    pub fn enter(&mut self, table: &str, key: &str) -> bool {
        self.records.insert((table.to_string(), key.to_string()))
    }

    /// Mark `table` as visited by a bulk walk. `false` if it already was.
    pub fn enter_table(&mut self, table: &str) -> bool {
        self.tables.insert(table.to_string())
    }

    /// Whether record `key` of `table` has been entered.
    pub fn visited(&self, table: &str, key: &str) -> bool {
        self.records
            .contains(&(table.to_string(), key.to_string()))
    }
}

impl<S: RecordStore> Session<S> {
    /// Associations of `table` that trash and restore propagate along.
    pub fn trash_associations<'a>(&'a self, table: &'a Table) -> Vec<&'a Association> {
        table
            .associations()
            .iter()
            .filter(|a| a.is_owning_side(table.alias()) && a.cascades_trash())
            .filter(|a| self.table(&a.target).is_ok_and(|t| t.supports_trash()))
            .collect()
    }

    /// Delete the live targets of every trash association of `record`,
    /// which trashes them through their own `beforeDelete` handler.
    pub(crate) async fn cascade_trash(
        &self,
        cx: &Cx,
        table: &Table,
        record: &Record,
        options: &OperationOptions,
        walk: &mut CascadeWalk,
    ) -> Outcome<bool, Error> {
        for association in self.trash_associations(table) {
            tracing::debug!(
                table = %table.alias(),
                association = %association.name,
                "Cascading trash"
            );
            if !try_outcome!(
                self.delete_associated(cx, table, association, record, options, walk)
                    .await
            ) {
                return Outcome::Ok(false);
            }
        }
        Outcome::Ok(true)
    }

    /// Restore `record` and, recursively, every record of its trash
    /// associations, trashed or not.
    ///
    /// Failures do not stop the walk: the remaining records are still
    /// restored and the result is `false`. Nothing is rolled back.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options))]
    pub async fn cascading_restore(
        &self,
        cx: &Cx,
        alias: &str,
        record: &mut Record,
        options: &OperationOptions,
    ) -> Outcome<bool, Error> {
        let mut walk = CascadeWalk::new();
        self.cascading_restore_boxed(cx, alias, record, options, &mut walk)
            .await
    }

    fn cascading_restore_boxed<'a>(
        &'a self,
        cx: &'a Cx,
        alias: &'a str,
        record: &'a mut Record,
        options: &'a OperationOptions,
        walk: &'a mut CascadeWalk,
    ) -> BoxFuture<'a, Outcome<bool, Error>> {
        Box::pin(async move {
            let table = try_result!(self.table(alias));
            let key = record.key_string(table.primary_key());
            if !walk.enter(alias, &key) {
                return Outcome::Ok(true);
            }

            let mut result = try_outcome!(self.restore_entity(cx, alias, record, options, walk).await);
            let cascaded = options.cascaded();

            for association in self.trash_associations(table) {
                let target = try_result!(self.table(&association.target));
                let binding = record.extract(table.binding_key(association));
                let cond = try_result!(key_condition(target.alias(), &association.foreign_key, &binding));
                let query = Select::new(target.alias())
                    .find(Finder::WithTrashed)
                    .filter(cond)
                    .secondary();
                let related = try_outcome!(self.find_boxed(cx, query).await);
                tracing::debug!(
                    table = alias,
                    association = %association.name,
                    related = related.len(),
                    "Cascading restore"
                );

                for mut child in related {
                    if !try_outcome!(
                        self.cascading_restore_boxed(cx, target.alias(), &mut child, &cascaded, walk)
                            .await
                    ) {
                        tracing::warn!(
                            table = %target.alias(),
                            key = %child.key_string(target.primary_key()),
                            "Cascaded restore failed"
                        );
                        result = false;
                    }
                }
            }
            Outcome::Ok(result)
        })
    }

    /// Restore every trashed row of `alias` and, when more than one row was
    /// restored, of the targets of its trash associations.
    ///
    /// Returns the total number of rows restored.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn cascading_restore_all(&self, cx: &Cx, alias: &str) -> Outcome<u64, Error> {
        let mut walk = CascadeWalk::new();
        self.cascading_restore_all_boxed(cx, alias, &mut walk).await
    }

    fn cascading_restore_all_boxed<'a>(
        &'a self,
        cx: &'a Cx,
        alias: &'a str,
        walk: &'a mut CascadeWalk,
    ) -> BoxFuture<'a, Outcome<u64, Error>> {
        Box::pin(async move {
            if !walk.enter_table(alias) {
                return Outcome::Ok(0);
            }
            let table = try_result!(self.table(alias));
            let mut count = try_outcome!(self.restore_all(cx, alias).await);
            if count > 1 {
                for association in self.trash_associations(table) {
                    count += try_outcome!(
                        self.cascading_restore_all_boxed(cx, &association.target, walk)
                            .await
                    );
                }
            }
            Outcome::Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_each_record_once() {
        let mut walk = CascadeWalk::new();
        assert!(walk.enter("Articles", "1"));
        assert!(!walk.enter("Articles", "1"));
        assert!(walk.enter("Comments", "1"));
        assert!(walk.visited("Articles", "1"));
        assert!(!walk.visited("Articles", "2"));
    }

    #[test]
    fn bulk_walk_tracks_tables() {
        let mut walk = CascadeWalk::new();
        assert!(walk.enter_table("Articles"));
        assert!(!walk.enter_table("Articles"));
        assert!(walk.enter_table("Comments"));
    }
}
