//! Session: table registry and the find/save/delete pipelines.
//!
//! Every operation dispatches its table's events, so the trash behavior (and
//! any other listener) sees finds, saves and deletes issued by the caller as
//! well as those issued by cascades and nested saves.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use asupersync::{Cx, Outcome};
use trashcan_core::{
    Association, AssociationKind, Clock, Error, OperationOptions, Record, Result, SaveStrategy,
    SystemClock, Value, check_rules, key_string, try_outcome, try_result,
};
use trashcan_query::{Delete, Expr, Insert, OrderBy, RecordStore, Select, Update};

use crate::behavior::{CascadeWalk, filter};
use crate::events::{Event, Handler, ModelEvent, Subject, TrashHandler};
use crate::table::{SupportsTrash, Table};

/// Boxed future for the mutually recursive pipelines.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Entry point for table operations over one record store.
pub struct Session<S> {
    store: S,
    tables: HashMap<String, Table>,
    clock: Arc<dyn Clock>,
}

impl<S: RecordStore> Session<S> {
    /// Create a session using the wall clock for trash timestamps.
    pub fn new(store: S) -> Self {
        Self {
            store,
            tables: HashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a table under its alias, replacing any previous one.
    pub fn add_table(&mut self, table: Table) -> &mut Self {
        tracing::debug!(
            table = %table.alias(),
            associations = table.associations().len(),
            trash = table.supports_trash(),
            "Registering table"
        );
        self.tables.insert(table.alias().to_string(), table);
        self
    }

    pub fn table(&self, alias: &str) -> Result<&Table> {
        self.tables
            .get(alias)
            .ok_or_else(|| Error::UnknownTable(alias.to_string()))
    }

    pub fn table_mut(&mut self, alias: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(alias)
            .ok_or_else(|| Error::UnknownTable(alias.to_string()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn now(&self) -> Value {
        Value::Timestamp(self.clock.now_micros())
    }

    // ==================== Reads ====================

    /// Run a query through the table's `beforeFind` listeners and load the
    /// associations it contains.
    #[tracing::instrument(level = "debug", skip(self, cx, query), fields(table = %query.table()))]
    pub async fn find(&self, cx: &Cx, query: Select) -> Outcome<Vec<Record>, Error> {
        self.find_boxed(cx, query).await
    }

    /// Number of rows `query` returns.
    pub async fn count(&self, cx: &Cx, query: Select) -> Outcome<usize, Error> {
        let rows = try_outcome!(self.find_boxed(cx, query).await);
        Outcome::Ok(rows.len())
    }

    /// Fetch one record of `alias` by primary key.
    pub async fn get(&self, cx: &Cx, alias: &str, key: &[Value]) -> Outcome<Record, Error> {
        self.get_with(cx, Select::new(alias), key).await
    }

    /// Fetch one record by primary key through `query` (finder, contain).
    #[tracing::instrument(level = "debug", skip(self, cx, query), fields(table = %query.table()))]
    pub async fn get_with(&self, cx: &Cx, query: Select, key: &[Value]) -> Outcome<Record, Error> {
        let table = try_result!(self.table(query.table()));
        let pk = table.primary_key();
        if pk.len() != key.len() {
            return Outcome::Err(Error::MissingKey {
                table: table.alias().to_string(),
                fields: pk.to_vec(),
            });
        }
        let cond = try_result!(key_condition(table.alias(), pk, key));
        let mut rows = try_outcome!(self.find_boxed(cx, query.filter(cond).limit(1)).await);
        if rows.is_empty() {
            return Outcome::Err(Error::RecordNotFound {
                table: table.alias().to_string(),
                key: key_string(key),
            });
        }
        Outcome::Ok(rows.swap_remove(0))
    }

    pub(crate) fn find_boxed<'a>(
        &'a self,
        cx: &'a Cx,
        query: Select,
    ) -> BoxFuture<'a, Outcome<Vec<Record>, Error>> {
        Box::pin(async move {
            let table = try_result!(self.table(query.table()));
            let mut query = query.from_table(table.table_name());
            try_result!(filter::apply_finder(table, &mut query));

            let mut walk = CascadeWalk::new();
            {
                let mut event = Event::for_query(ModelEvent::BeforeFind, table.alias(), &mut query);
                try_outcome!(self.dispatch(cx, &mut event, &mut walk).await);
            }

            let mut rows = try_outcome!(self.store.select(cx, &query).await);
            tracing::debug!(
                table = %table.alias(),
                finder = query.finder().name(),
                primary = query.is_primary(),
                rows = rows.len(),
                "Find complete"
            );

            for name in query.contained() {
                try_outcome!(self.load_contained(cx, table, name, &mut rows).await);
            }
            Outcome::Ok(rows)
        })
    }

    /// Attach the records of association `name` to every row.
    async fn load_contained(
        &self,
        cx: &Cx,
        table: &Table,
        name: &str,
        rows: &mut [Record],
    ) -> Outcome<(), Error> {
        let association = try_result!(table.get_association(name));
        let target = try_result!(self.table(&association.target));

        let loaded: Vec<Vec<Record>> = match association.kind {
            AssociationKind::HasOne | AssociationKind::HasMany => {
                let owner_key = table.binding_key(association);
                let keys = distinct_keys(rows, owner_key);
                let children = if keys.is_empty() {
                    Vec::new()
                } else {
                    let cond = try_result!(keys_condition(
                        target.alias(),
                        &association.foreign_key,
                        &keys
                    ));
                    let query = sorted(Select::new(target.alias()).filter(cond), association);
                    try_outcome!(self.find_boxed(cx, query.secondary()).await)
                };
                rows.iter()
                    .map(|row| {
                        let key = row.extract(owner_key);
                        children
                            .iter()
                            .filter(|c| keys_equal(&c.extract(&association.foreign_key), &key))
                            .cloned()
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
            AssociationKind::BelongsTo => {
                let target_key = target.binding_key(association);
                let keys = distinct_keys(rows, &association.foreign_key);
                let parents = if keys.is_empty() {
                    Vec::new()
                } else {
                    let cond = try_result!(keys_condition(target.alias(), target_key, &keys));
                    let query = Select::new(target.alias()).filter(cond).secondary();
                    try_outcome!(self.find_boxed(cx, query).await)
                };
                rows.iter()
                    .map(|row| {
                        let key = row.extract(&association.foreign_key);
                        parents
                            .iter()
                            .filter(|p| keys_equal(&p.extract(target_key), &key))
                            .cloned()
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
            AssociationKind::BelongsToMany => {
                let Some(through) = &association.through else {
                    return Outcome::Err(Error::Custom(format!(
                        "association '{}' of '{}' has no join table",
                        association.name,
                        table.alias()
                    )));
                };
                let junction = try_result!(self.table(&through.table));
                let owner_key = table.binding_key(association);
                let target_pk = target.primary_key();

                let keys = distinct_keys(rows, owner_key);
                let links = if keys.is_empty() {
                    Vec::new()
                } else {
                    let cond = try_result!(keys_condition(junction.alias(), &through.foreign_key, &keys));
                    let query = Select::new(junction.alias()).filter(cond).secondary();
                    try_outcome!(self.find_boxed(cx, query).await)
                };
                let target_keys = distinct_keys(&links, &through.target_foreign_key);
                let targets = if target_keys.is_empty() {
                    Vec::new()
                } else {
                    let cond = try_result!(keys_condition(target.alias(), target_pk, &target_keys));
                    let query = sorted(Select::new(target.alias()).filter(cond), association);
                    try_outcome!(self.find_boxed(cx, query.secondary()).await)
                };
                rows.iter()
                    .map(|row| {
                        let key = row.extract(owner_key);
                        let linked: Vec<Vec<Value>> = links
                            .iter()
                            .filter(|l| keys_equal(&l.extract(&through.foreign_key), &key))
                            .map(|l| l.extract(&through.target_foreign_key))
                            .collect();
                        targets
                            .iter()
                            .filter(|t| {
                                let target_key = t.extract(target_pk);
                                linked.iter().any(|k| keys_equal(k, &target_key))
                            })
                            .cloned()
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
        };

        for (row, mut records) in rows.iter_mut().zip(loaded) {
            if !association.is_collection() {
                records.truncate(1);
            }
            row.set_loaded(association.name.clone(), records);
        }
        Outcome::Ok(())
    }

    // ==================== Save ====================

    /// Save a record: insert when new, update its dirty fields otherwise,
    /// then save changed `HasOne`/`HasMany` children.
    ///
    /// Returns `false` when a `beforeSave` listener stops the save, a
    /// validation rule fails, no row was updated, or a child fails to save.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options))]
    pub async fn save(
        &self,
        cx: &Cx,
        alias: &str,
        record: &mut Record,
        options: &OperationOptions,
    ) -> Outcome<bool, Error> {
        let mut walk = CascadeWalk::new();
        self.save_boxed(cx, alias, record, options, &mut walk).await
    }

    pub(crate) fn save_boxed<'a>(
        &'a self,
        cx: &'a Cx,
        alias: &'a str,
        record: &'a mut Record,
        options: &'a OperationOptions,
        walk: &'a mut CascadeWalk,
    ) -> BoxFuture<'a, Outcome<bool, Error>> {
        Box::pin(async move {
            let table = try_result!(self.table(alias));
            let mut options = options.clone();

            {
                let mut event = Event::for_record(ModelEvent::BeforeSave, alias, &mut *record, &mut options);
                try_outcome!(self.dispatch(cx, &mut event, walk).await);
                if event.is_stopped() {
                    tracing::debug!(table = alias, "Save stopped by beforeSave listener");
                    return Outcome::Ok(event.result().unwrap_or(false));
                }
            }

            if options.check_rules {
                let errors = check_rules(table.rules(), record);
                if !errors.is_empty() {
                    tracing::debug!(table = alias, errors = errors.errors.len(), "Save failed validation");
                    record.set_errors(errors);
                    return Outcome::Ok(false);
                }
            }
            record.clear_errors();

            if record.is_new() {
                let insert = Insert::new(table.table_name()).values(
                    record
                        .values()
                        .map(|(field, value)| (field.to_string(), value.clone())),
                );
                let generated = try_outcome!(self.store.insert(cx, &insert).await);
                if let (Some(id), Some(key)) = (generated, table.schema().auto_increment_key()) {
                    record.set_clean(key, Value::BigInt(id));
                }
            } else {
                let changes = record.dirty_values();
                if !changes.is_empty() {
                    let pk = table.primary_key();
                    let cond = try_result!(record_key_condition(table, record));
                    let update = Update::new(table.table_name())
                        .alias(alias)
                        .set_all(changes)
                        .filter(cond);
                    let affected = try_outcome!(self.store.update(cx, &update).await);
                    if affected == 0 {
                        tracing::debug!(table = alias, key = %record.key_string(pk), "Update matched no rows");
                        return Outcome::Ok(false);
                    }
                }
            }

            for association in table.associations() {
                if matches!(
                    association.kind,
                    AssociationKind::HasOne | AssociationKind::HasMany
                ) && !try_outcome!(
                    self.save_association(cx, table, association, record, &options, walk)
                        .await
                ) {
                    return Outcome::Ok(false);
                }
            }

            record.mark_persisted();

            let mut event = Event::for_record(ModelEvent::AfterSave, alias, &mut *record, &mut options);
            try_outcome!(self.dispatch(cx, &mut event, walk).await);
            Outcome::Ok(true)
        })
    }

    /// Save the children attached to `record` under `association`, if the
    /// caller changed them.
    async fn save_association(
        &self,
        cx: &Cx,
        table: &Table,
        association: &Association,
        record: &mut Record,
        options: &OperationOptions,
        walk: &mut CascadeWalk,
    ) -> Outcome<bool, Error> {
        let Some(mut associated) = record.take_associated(&association.name) else {
            return Outcome::Ok(true);
        };
        if !associated.dirty {
            record.put_associated(association.name.clone(), associated);
            return Outcome::Ok(true);
        }

        let parent_key = record.extract(table.binding_key(association));
        let cascaded = options.cascaded();
        let outcome = async {
            for child in &mut associated.records {
                for (field, value) in association.foreign_key.iter().zip(&parent_key) {
                    if child.get(field).and_then(|v| v.sql_eq(value)) != Some(true) {
                        child.set(field.clone(), value.clone());
                    }
                }
                if (child.is_new() || child.is_dirty())
                    && !try_outcome!(
                        self.save_boxed(cx, &association.target, child, &cascaded, walk)
                            .await
                    )
                {
                    tracing::warn!(
                        table = %table.alias(),
                        association = %association.name,
                        "Saving associated record failed"
                    );
                    return Outcome::Ok(false);
                }
            }
            if association.save_strategy == SaveStrategy::Replace {
                return self
                    .unlink_removed(cx, association, &parent_key, &associated.records, options, walk)
                    .await;
            }
            Outcome::Ok(true)
        }
        .await;

        record.put_associated(association.name.clone(), associated);
        outcome
    }

    /// Detach the rows of `association` that are no longer in `kept`.
    ///
    /// Dependent rows are deleted (through the delete pipeline when the
    /// association cascades callbacks), others get their foreign key cleared.
    async fn unlink_removed(
        &self,
        cx: &Cx,
        association: &Association,
        parent_key: &[Value],
        kept: &[Record],
        options: &OperationOptions,
        walk: &mut CascadeWalk,
    ) -> Outcome<bool, Error> {
        let target = try_result!(self.table(&association.target));
        let target_pk = target.primary_key();
        let kept_keys: Vec<Vec<Value>> = kept
            .iter()
            .filter(|r| r.is_persisted())
            .map(|r| r.extract(target_pk))
            .collect();

        let cond = try_result!(key_condition(target.alias(), &association.foreign_key, parent_key));
        let existing = try_outcome!(
            self.find_boxed(cx, Select::new(target.alias()).filter(cond).secondary())
                .await
        );
        let removed: Vec<Record> = existing
            .into_iter()
            .filter(|row| {
                let key = row.extract(target_pk);
                !kept_keys.iter().any(|k| keys_equal(k, &key))
            })
            .collect();
        if removed.is_empty() {
            return Outcome::Ok(true);
        }
        tracing::debug!(
            association = %association.name,
            removed = removed.len(),
            dependent = association.dependent,
            "Replacing associated records"
        );

        let cascaded = options.cascaded();
        for mut row in removed {
            let cond = try_result!(record_key_condition(target, &row));
            if association.dependent && association.cascade_callbacks {
                if !try_outcome!(
                    self.delete_boxed(cx, target.alias(), &mut row, &cascaded, walk)
                        .await
                ) {
                    return Outcome::Ok(false);
                }
            } else if association.dependent {
                let delete = Delete::new(target.table_name())
                    .alias(target.alias())
                    .filter(cond);
                try_outcome!(self.store.delete(cx, &delete).await);
            } else {
                let update = Update::new(target.table_name())
                    .alias(target.alias())
                    .set_all(
                        association
                            .foreign_key
                            .iter()
                            .map(|field| (field.clone(), Value::Null)),
                    )
                    .filter(cond);
                try_outcome!(self.store.update(cx, &update).await);
            }
        }
        Outcome::Ok(true)
    }

    // ==================== Delete ====================

    /// Delete a record, cascading to dependent associations.
    ///
    /// On a table with the trash behavior the `beforeDelete` handler turns
    /// this into a trash unless `options.purge` is set.
    #[tracing::instrument(level = "debug", skip(self, cx, record, options))]
    pub async fn delete(
        &self,
        cx: &Cx,
        alias: &str,
        record: &mut Record,
        options: &OperationOptions,
    ) -> Outcome<bool, Error> {
        let mut walk = CascadeWalk::new();
        self.delete_boxed(cx, alias, record, options, &mut walk).await
    }

    pub(crate) fn delete_boxed<'a>(
        &'a self,
        cx: &'a Cx,
        alias: &'a str,
        record: &'a mut Record,
        options: &'a OperationOptions,
        walk: &'a mut CascadeWalk,
    ) -> BoxFuture<'a, Outcome<bool, Error>> {
        Box::pin(async move {
            let table = try_result!(self.table(alias));
            let cond = try_result!(record_key_condition(table, record));
            let mut options = options.clone();

            {
                let mut event = Event::for_record(ModelEvent::BeforeDelete, alias, &mut *record, &mut options);
                try_outcome!(self.dispatch(cx, &mut event, walk).await);
                if event.is_stopped() {
                    return Outcome::Ok(event.result().unwrap_or(false));
                }
            }

            if !try_outcome!(self.cascade_dependents(cx, table, record, &options, walk).await) {
                return Outcome::Ok(false);
            }

            let delete = Delete::new(table.table_name()).alias(alias).filter(cond);
            let affected = try_outcome!(self.store.delete(cx, &delete).await);
            if affected == 0 {
                return Outcome::Ok(false);
            }
            tracing::debug!(table = alias, key = %record.key_string(table.primary_key()), "Deleted record");

            let mut event = Event::for_record(ModelEvent::AfterDelete, alias, &mut *record, &mut options);
            try_outcome!(self.dispatch(cx, &mut event, walk).await);
            Outcome::Ok(true)
        })
    }

    async fn cascade_dependents(
        &self,
        cx: &Cx,
        table: &Table,
        record: &Record,
        options: &OperationOptions,
        walk: &mut CascadeWalk,
    ) -> Outcome<bool, Error> {
        for association in table.associations() {
            if !association.dependent || !association.is_owning_side(table.alias()) {
                continue;
            }
            match association.kind {
                AssociationKind::HasOne | AssociationKind::HasMany => {
                    if !try_outcome!(
                        self.delete_associated(cx, table, association, record, options, walk)
                            .await
                    ) {
                        return Outcome::Ok(false);
                    }
                }
                AssociationKind::BelongsToMany => {
                    let Some(through) = &association.through else {
                        continue;
                    };
                    let junction = try_result!(self.table(&through.table));
                    let key = record.extract(table.binding_key(association));
                    let cond = try_result!(key_condition(junction.alias(), &through.foreign_key, &key));
                    let delete = Delete::new(junction.table_name())
                        .alias(junction.alias())
                        .filter(cond);
                    let removed = try_outcome!(self.store.delete(cx, &delete).await);
                    tracing::debug!(join_table = %junction.alias(), removed, "Removed join rows");
                }
                AssociationKind::BelongsTo => {}
            }
        }
        Outcome::Ok(true)
    }

    /// Delete the targets of `association` currently linked to `record`.
    ///
    /// With `cascade_callbacks` each target goes through the delete pipeline
    /// of its own table; otherwise they are removed with one statement.
    pub(crate) async fn delete_associated(
        &self,
        cx: &Cx,
        table: &Table,
        association: &Association,
        record: &Record,
        options: &OperationOptions,
        walk: &mut CascadeWalk,
    ) -> Outcome<bool, Error> {
        let target = try_result!(self.table(&association.target));
        let key = record.extract(table.binding_key(association));
        if key.iter().any(Value::is_null) {
            return Outcome::Ok(true);
        }
        let cond = try_result!(key_condition(target.alias(), &association.foreign_key, &key));

        if association.cascade_callbacks {
            let query = Select::new(target.alias()).filter(cond).secondary();
            let children = try_outcome!(self.find_boxed(cx, query).await);
            tracing::debug!(
                table = %table.alias(),
                association = %association.name,
                children = children.len(),
                "Cascading delete"
            );
            let cascaded = options.cascaded();
            for mut child in children {
                if !try_outcome!(
                    self.delete_boxed(cx, target.alias(), &mut child, &cascaded, walk)
                        .await
                ) {
                    tracing::warn!(
                        table = %target.alias(),
                        key = %child.key_string(target.primary_key()),
                        "Cascaded delete failed"
                    );
                    return Outcome::Ok(false);
                }
            }
        } else {
            let delete = Delete::new(target.table_name())
                .alias(target.alias())
                .filter(cond);
            let removed = try_outcome!(self.store.delete(cx, &delete).await);
            tracing::debug!(table = %target.alias(), removed, "Cascading bulk delete");
        }
        Outcome::Ok(true)
    }

    // ==================== Bulk statements ====================

    /// Physically delete every row of `alias` matching `conditions`, without
    /// events or cascades.
    #[tracing::instrument(level = "debug", skip(self, cx, conditions))]
    pub async fn delete_all(
        &self,
        cx: &Cx,
        alias: &str,
        conditions: Option<Expr>,
    ) -> Outcome<u64, Error> {
        let table = try_result!(self.table(alias));
        let mut delete = Delete::new(table.table_name()).alias(alias);
        if let Some(cond) = conditions {
            delete = delete.filter(cond);
        }
        self.store.delete(cx, &delete).await
    }

    /// Update every row of `alias` matching `conditions`, without events,
    /// validation or cascades.
    #[tracing::instrument(level = "debug", skip(self, cx, values, conditions))]
    pub async fn update_all(
        &self,
        cx: &Cx,
        alias: &str,
        values: Vec<(String, Value)>,
        conditions: Option<Expr>,
    ) -> Outcome<u64, Error> {
        let table = try_result!(self.table(alias));
        let update = Update::new(table.table_name())
            .alias(alias)
            .set_all(values)
            .filter_opt(conditions);
        self.store.update(cx, &update).await
    }

    // ==================== Events ====================

    /// Run the listeners of `event` on its table, in priority order.
    pub(crate) fn dispatch<'a, 'e: 'a>(
        &'a self,
        cx: &'a Cx,
        event: &'a mut Event<'e>,
        walk: &'a mut CascadeWalk,
    ) -> BoxFuture<'a, Outcome<(), Error>> {
        Box::pin(async move {
            let table = try_result!(self.table(event.table()));
            for handler in table.events().handlers(event.name()) {
                match handler {
                    Handler::Callback(callback) => try_result!(callback(&mut *event)),
                    Handler::Trash(TrashHandler::Filter) => {
                        if let Some(query) = event.query_mut() {
                            try_result!(filter::add_trash_condition(table, query));
                        }
                    }
                    Handler::Trash(TrashHandler::SoftDelete) => {
                        try_outcome!(self.soft_delete(cx, &mut *event, &mut *walk).await);
                    }
                }
                if event.is_stopped() {
                    tracing::debug!(
                        table = %event.table(),
                        event = %event.name(),
                        "Event propagation stopped"
                    );
                    break;
                }
            }
            Outcome::Ok(())
        })
    }

    /// `Model.beforeDelete` handler of the trash behavior.
    async fn soft_delete(
        &self,
        cx: &Cx,
        event: &mut Event<'_>,
        walk: &mut CascadeWalk,
    ) -> Outcome<(), Error> {
        let alias = event.table().to_string();
        let Subject::Record { record, options } = event.subject_mut() else {
            return Outcome::Ok(());
        };
        if options.purge {
            tracing::debug!(table = %alias, "Purge requested, deleting physically");
            return Outcome::Ok(());
        }
        let pk = try_result!(self.table(&alias)).primary_key();
        if record.missing(pk).is_empty() && walk.visited(&alias, &record.key_string(pk)) {
            tracing::debug!(table = %alias, "Record is already being trashed by this walk");
            event.halt(true);
            return Outcome::Ok(());
        }

        let trashed = try_outcome!(
            self.trash_boxed(cx, &alias, &mut **record, &**options, &mut *walk)
                .await
        );
        if trashed {
            options.soft_deleted = true;
            let mut after = Event::for_record(
                ModelEvent::AfterDelete,
                alias.as_str(),
                &mut **record,
                &mut **options,
            );
            try_outcome!(self.dispatch(cx, &mut after, walk).await);
        }
        event.halt(trashed);
        Outcome::Ok(())
    }
}

/// Condition matching `fields` of `alias` against one key.
pub(crate) fn key_condition(alias: &str, fields: &[String], key: &[Value]) -> Result<Expr> {
    Expr::key_match(Some(alias), fields, key)
        .ok_or_else(|| Error::Custom(format!("no key fields to match on '{alias}'")))
}

/// Condition matching the primary key of `record` in `table`.
pub(crate) fn record_key_condition(table: &Table, record: &Record) -> Result<Expr> {
    let pk = table.primary_key();
    let missing = record.missing(pk);
    if !missing.is_empty() {
        return Err(Error::MissingKey {
            table: table.alias().to_string(),
            fields: missing.into_iter().map(str::to_string).collect(),
        });
    }
    key_condition(table.alias(), pk, &record.extract(pk))
}

/// Condition matching `fields` of `alias` against any of `keys`.
fn keys_condition(alias: &str, fields: &[String], keys: &[Vec<Value>]) -> Result<Expr> {
    if let [field] = fields {
        let values: Vec<Value> = keys.iter().filter_map(|k| k.first().cloned()).collect();
        return Ok(Expr::qualified(alias, field.as_str()).in_list(values));
    }
    keys.iter()
        .filter_map(|key| Expr::key_match(Some(alias), fields, key))
        .reduce(Expr::or)
        .map(Expr::paren)
        .ok_or_else(|| Error::Custom(format!("no key fields to match on '{alias}'")))
}

/// Distinct non-null values of `fields` across `rows`.
fn distinct_keys(rows: &[Record], fields: &[String]) -> Vec<Vec<Value>> {
    let mut keys: Vec<Vec<Value>> = Vec::new();
    for row in rows {
        let key = row.extract(fields);
        if key.iter().any(Value::is_null) || keys.iter().any(|k| keys_equal(k, &key)) {
            continue;
        }
        keys.push(key);
    }
    keys
}

pub(crate) fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.sql_eq(y) == Some(true))
}

fn sorted(mut query: Select, association: &Association) -> Select {
    let alias = query.table().to_string();
    for (field, ascending) in &association.sort {
        let column = if field.contains('.') {
            field.clone()
        } else {
            format!("{alias}.{field}")
        };
        query = query.order_by(if *ascending {
            OrderBy::asc(column)
        } else {
            OrderBy::desc(column)
        });
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_across_integer_widths() {
        assert!(keys_equal(&[Value::Int(1)], &[Value::BigInt(1)]));
        assert!(!keys_equal(&[Value::Int(1)], &[Value::Int(1), Value::Int(2)]));
        assert!(!keys_equal(&[Value::Null], &[Value::Null]));
    }

    #[test]
    fn distinct_keys_skip_nulls_and_duplicates() {
        let rows = vec![
            Record::persisted([("id", 1)]),
            Record::persisted([("id", Value::BigInt(1))]),
            Record::persisted([("id", Value::Null)]),
            Record::persisted([("id", 2)]),
        ];
        let keys = distinct_keys(&rows, &["id".to_string()]);
        assert_eq!(keys, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[test]
    fn single_and_composite_key_conditions() {
        let single = keys_condition(
            "Comments",
            &["article_id".to_string()],
            &[vec![Value::Int(1)], vec![Value::Int(2)]],
        )
        .unwrap();
        assert_eq!(
            single.to_sql(),
            "\"Comments\".\"article_id\" IN ($1, $2)"
        );

        let composite = keys_condition(
            "ArticlesUsers",
            &["article_id".to_string(), "user_id".to_string()],
            &[
                vec![Value::Int(1), Value::Int(1)],
                vec![Value::Int(3), Value::Int(1)],
            ],
        )
        .unwrap();
        assert!(composite.to_sql().starts_with("(\"ArticlesUsers\".\"article_id\" = $1 AND"));

        assert!(keys_condition("Comments", &[], &[vec![Value::Int(1)]]).is_err());
    }

    #[test]
    fn record_key_requires_every_field() {
        let table = Table::new(
            "CompositeArticlesUsers",
            trashcan_core::TableSchema::new("composite_articles_users")
                .primary_key(["article_id", "user_id"]),
        );
        let err = record_key_condition(&table, &Record::persisted([("article_id", 1)])).unwrap_err();
        assert!(matches!(err, Error::MissingKey { fields, .. } if fields == ["user_id".to_string()]));
    }

    #[test]
    fn association_sort_is_qualified() {
        let assoc = Association::has_many("Articles", "Comments", ["article_id"]).sort("id", false);
        let query = sorted(Select::new("Comments"), &assoc);
        assert_eq!(query.order()[0].column(), "Comments.id");
    }
}
