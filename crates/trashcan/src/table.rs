//! Table definitions.
//!
//! A [`Table`] is the unit the session works with: an alias, the schema of the
//! physical table behind it, its associations and validation rules, its event
//! listeners and, optionally, a [`TrashBehavior`].

use std::sync::Arc;

use trashcan_core::{Association, Error, Result, Rule, TableSchema};

use crate::behavior::{TrashBehavior, TrashConfig, field};
use crate::events::{Event, EventManager, ModelEvent};

/// Capability of a table to be trashed.
///
/// Cascades only follow associations whose target implements this with a
/// behavior attached.
pub trait SupportsTrash {
    fn trash_behavior(&self) -> Option<&TrashBehavior>;

    fn supports_trash(&self) -> bool {
        self.trash_behavior().is_some()
    }

    /// The trash field, qualified with the table alias when `aliased`.
    fn trash_field(&self, aliased: bool) -> Result<String>;
}

/// A table registered with a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct Table {
    alias: String,
    schema: TableSchema,
    associations: Vec<Association>,
    rules: Vec<Rule>,
    events: EventManager,
    trash: Option<Arc<TrashBehavior>>,
}

impl Table {
    pub fn new(alias: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            alias: alias.into(),
            schema,
            associations: Vec::new(),
            rules: Vec::new(),
            events: EventManager::new(),
            trash: None,
        }
    }

    /// Declare an association. Its source should be this table's alias.
    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Add a validation rule checked on save.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Attach the trash behavior and register its listeners.
    pub fn with_trash(mut self, config: TrashConfig) -> Result<Self> {
        let behavior = TrashBehavior::new(config)?;
        for binding in behavior.implemented_events() {
            self.events
                .add(binding.event, binding.priority, binding.handler.clone());
        }
        tracing::debug!(
            table = %self.alias,
            listeners = behavior.implemented_events().len(),
            "Attached trash behavior"
        );
        self.trash = Some(Arc::new(behavior));
        Ok(self)
    }

    /// Register a listener with the default priority.
    pub fn on<F>(&mut self, event: ModelEvent, callback: F) -> &mut Self
    where
        F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.events.on(event, callback);
        self
    }

    pub fn on_with_priority<F>(&mut self, event: ModelEvent, priority: i32, callback: F) -> &mut Self
    where
        F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.events.on_with_priority(event, priority, callback);
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Name of the physical table.
    pub fn table_name(&self) -> &str {
        &self.schema.name
    }

    pub fn primary_key(&self) -> &[String] {
        &self.schema.primary_key
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// Look up an association by name.
    pub fn get_association(&self, name: &str) -> Result<&Association> {
        self.associations
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::UnknownAssociation {
                table: self.alias.clone(),
                name: name.to_string(),
            })
    }

    /// Key fields on this table that `association` binds to.
    pub fn binding_key<'a>(&'a self, association: &'a Association) -> &'a [String] {
        if association.binding_key.is_empty() {
            self.primary_key()
        } else {
            &association.binding_key
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    /// The trash behavior, or `TrashNotSupported`.
    pub fn require_trash(&self) -> Result<&TrashBehavior> {
        self.trash_behavior()
            .ok_or_else(|| Error::TrashNotSupported(self.alias.clone()))
    }
}

impl SupportsTrash for Table {
    fn trash_behavior(&self) -> Option<&TrashBehavior> {
        self.trash.as_deref()
    }

    fn trash_field(&self, aliased: bool) -> Result<String> {
        let behavior = self.require_trash()?;
        field::trash_field(behavior, &self.alias, &self.schema, aliased)
    }
}
