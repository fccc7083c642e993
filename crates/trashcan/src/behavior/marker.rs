//! Trash marking: trash, bulk trash, empty trash and restore.

use asupersync::{Cx, Outcome};
use trashcan_core::{Error, OperationOptions, Record, Value, try_outcome, try_result};
use trashcan_query::{Delete, Expr, RecordStore, Update};

use super::CascadeWalk;
use crate::session::{BoxFuture, Session};
use crate::table::SupportsTrash;

impl<S: RecordStore> Session<S> {
    /// Trash one record.
    ///
    /// Dependent associations are trashed first when `cascade_on_trash` is
    /// set; if one of them fails the record is left as it was and `false` is
    /// returned. The trash field is then set to the current time and the
    /// record goes through the full save pipeline.
    ///
    /// Fails with `MissingKey` unless every primary key field is set.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options))]
    pub async fn trash(
        &self,
        cx: &Cx,
        alias: &str,
        record: &mut Record,
        options: &OperationOptions,
    ) -> Outcome<bool, Error> {
        let mut walk = CascadeWalk::new();
        self.trash_boxed(cx, alias, record, options, &mut walk).await
    }

    pub(crate) fn trash_boxed<'a>(
        &'a self,
        cx: &'a Cx,
        alias: &'a str,
        record: &'a mut Record,
        options: &'a OperationOptions,
        walk: &'a mut CascadeWalk,
    ) -> BoxFuture<'a, Outcome<bool, Error>> {
        Box::pin(async move {
            let table = try_result!(self.table(alias));
            let behavior = try_result!(table.require_trash());

            let pk = table.primary_key();
            let missing = record.missing(pk);
            if !missing.is_empty() {
                return Outcome::Err(Error::MissingKey {
                    table: alias.to_string(),
                    fields: missing.into_iter().map(str::to_string).collect(),
                });
            }
            let key = record.key_string(pk);
            if !walk.enter(alias, &key) {
                tracing::debug!(table = alias, key = %key, "Record already trashed in this walk");
                return Outcome::Ok(true);
            }

            if behavior.cascade_on_trash()
                && !try_outcome!(self.cascade_trash(cx, table, record, options, walk).await)
            {
                tracing::warn!(table = alias, key = %key, "Cascading trash failed");
                return Outcome::Ok(false);
            }

            let field = try_result!(table.trash_field(false));
            record.set(field, self.now());
            let saved = try_outcome!(self.save_boxed(cx, alias, record, options, walk).await);
            tracing::debug!(table = alias, key = %key, saved, "Trashed record");
            Outcome::Ok(saved)
        })
    }

    /// Trash every row matching `conditions` (all rows when `None`) with
    /// one UPDATE. No validation, events or cascades.
    #[tracing::instrument(level = "debug", skip(self, cx, conditions))]
    pub async fn trash_all(
        &self,
        cx: &Cx,
        alias: &str,
        conditions: Option<Expr>,
    ) -> Outcome<u64, Error> {
        let table = try_result!(self.table(alias));
        let field = try_result!(table.trash_field(false));
        let update = Update::new(table.table_name())
            .alias(alias)
            .set(field, self.now())
            .filter_opt(conditions);
        let count = try_outcome!(self.store().update(cx, &update).await);
        tracing::info!(table = alias, count, "Trashed rows");
        Outcome::Ok(count)
    }

    /// Physically delete every trashed row.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn empty_trash(&self, cx: &Cx, alias: &str) -> Outcome<u64, Error> {
        let table = try_result!(self.table(alias));
        let field = try_result!(table.trash_field(true));
        let delete = Delete::new(table.table_name())
            .alias(alias)
            .filter(Expr::field(&field).is_not_null());
        let count = try_outcome!(self.store().delete(cx, &delete).await);
        tracing::info!(table = alias, count, "Emptied trash");
        Outcome::Ok(count)
    }

    /// Restore one record without touching its associations.
    ///
    /// Fails with `DirtyEntity` if the record has unsaved changes.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options))]
    pub async fn restore(
        &self,
        cx: &Cx,
        alias: &str,
        record: &mut Record,
        options: &OperationOptions,
    ) -> Outcome<bool, Error> {
        let mut walk = CascadeWalk::new();
        self.restore_entity(cx, alias, record, options, &mut walk)
            .await
    }

    pub(crate) async fn restore_entity(
        &self,
        cx: &Cx,
        alias: &str,
        record: &mut Record,
        options: &OperationOptions,
        walk: &mut CascadeWalk,
    ) -> Outcome<bool, Error> {
        let table = try_result!(self.table(alias));
        try_result!(table.require_trash());
        if record.is_dirty() {
            return Outcome::Err(Error::DirtyEntity {
                table: alias.to_string(),
                dirty: record.dirty_fields(),
            });
        }
        let field = try_result!(table.trash_field(false));
        record.set(field, Value::Null);
        self.save_boxed(cx, alias, record, options, walk).await
    }

    /// Restore every trashed row of `alias` with one UPDATE.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn restore_all(&self, cx: &Cx, alias: &str) -> Outcome<u64, Error> {
        let table = try_result!(self.table(alias));
        let column = try_result!(table.trash_field(false));
        let qualified = try_result!(table.trash_field(true));
        let update = Update::new(table.table_name())
            .alias(alias)
            .set(column, Value::Null)
            .filter(Expr::field(&qualified).is_not_null());
        let count = try_outcome!(self.store().update(cx, &update).await);
        tracing::info!(table = alias, count, "Restored rows");
        Outcome::Ok(count)
    }
}
