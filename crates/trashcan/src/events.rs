//! Table events and listener registry.
//!
//! Every table owns an [`EventManager`]. The session dispatches
//! [`ModelEvent`]s around find, save and delete; listeners run in ascending
//! priority order (registration order breaks ties) and may stop propagation
//! and set a boolean result for the operation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trashcan_core::{Error, OperationOptions, Record, Result};
use trashcan_query::Select;

/// Priority listeners get when none is given.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Events dispatched by the table layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelEvent {
    #[serde(rename = "Model.beforeFind")]
    BeforeFind,
    #[serde(rename = "Model.beforeSave")]
    BeforeSave,
    #[serde(rename = "Model.afterSave")]
    AfterSave,
    #[serde(rename = "Model.beforeDelete")]
    BeforeDelete,
    #[serde(rename = "Model.afterDelete")]
    AfterDelete,
}

impl ModelEvent {
    pub const ALL: [ModelEvent; 5] = [
        ModelEvent::BeforeFind,
        ModelEvent::BeforeSave,
        ModelEvent::AfterSave,
        ModelEvent::BeforeDelete,
        ModelEvent::AfterDelete,
    ];

    /// The dotted event name, e.g. `Model.beforeDelete`.
    pub const fn name(self) -> &'static str {
        match self {
            ModelEvent::BeforeFind => "Model.beforeFind",
            ModelEvent::BeforeSave => "Model.beforeSave",
            ModelEvent::AfterSave => "Model.afterSave",
            ModelEvent::BeforeDelete => "Model.beforeDelete",
            ModelEvent::AfterDelete => "Model.afterDelete",
        }
    }

    /// The part after `Model.`, e.g. `beforeDelete`.
    pub fn suffix(self) -> &'static str {
        let name = self.name();
        &name["Model.".len()..]
    }

    /// Parse a dotted event name.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == name)
            .ok_or_else(|| Error::InvalidEventConfig(format!("unknown event '{name}'")))
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an event is about.
#[derive(Debug)]
pub enum Subject<'a> {
    /// A record being saved or deleted, with the options of that call
    Record {
        record: &'a mut Record,
        options: &'a mut OperationOptions,
    },
    /// A query about to be executed
    Query(&'a mut Select),
}

/// One dispatched event, passed to every listener in turn.
#[derive(Debug)]
pub struct Event<'a> {
    name: ModelEvent,
    table: String,
    subject: Subject<'a>,
    stopped: bool,
    result: Option<bool>,
}

impl<'a> Event<'a> {
    pub fn for_record(
        name: ModelEvent,
        table: impl Into<String>,
        record: &'a mut Record,
        options: &'a mut OperationOptions,
    ) -> Self {
        Self::new(name, table, Subject::Record { record, options })
    }

    pub fn for_query(name: ModelEvent, table: impl Into<String>, query: &'a mut Select) -> Self {
        Self::new(name, table, Subject::Query(query))
    }

    fn new(name: ModelEvent, table: impl Into<String>, subject: Subject<'a>) -> Self {
        Self {
            name,
            table: table.into(),
            subject,
            stopped: false,
            result: None,
        }
    }

    pub fn name(&self) -> ModelEvent {
        self.name
    }

    /// Alias of the table the event was dispatched on.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn subject(&self) -> &Subject<'a> {
        &self.subject
    }

    pub fn subject_mut(&mut self) -> &mut Subject<'a> {
        &mut self.subject
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.subject {
            Subject::Record { record, .. } => Some(&**record),
            Subject::Query(_) => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match &mut self.subject {
            Subject::Record { record, .. } => Some(&mut **record),
            Subject::Query(_) => None,
        }
    }

    pub fn options(&self) -> Option<&OperationOptions> {
        match &self.subject {
            Subject::Record { options, .. } => Some(&**options),
            Subject::Query(_) => None,
        }
    }

    pub fn options_mut(&mut self) -> Option<&mut OperationOptions> {
        match &mut self.subject {
            Subject::Record { options, .. } => Some(&mut **options),
            Subject::Query(_) => None,
        }
    }

    pub fn query(&self) -> Option<&Select> {
        match &self.subject {
            Subject::Query(query) => Some(&**query),
            Subject::Record { .. } => None,
        }
    }

    pub fn query_mut(&mut self) -> Option<&mut Select> {
        match &mut self.subject {
            Subject::Query(query) => Some(&mut **query),
            Subject::Record { .. } => None,
        }
    }

    /// Skip the remaining listeners and the operation's default action.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn set_result(&mut self, result: bool) {
        self.result = Some(result);
    }

    pub fn result(&self) -> Option<bool> {
        self.result
    }

    /// Stop propagation and report `result` for the operation.
    pub fn halt(&mut self, result: bool) {
        self.stop_propagation();
        self.set_result(result);
    }
}

/// Listener callback. Returning an error aborts the operation with it.
pub type EventCallback = Arc<dyn Fn(&mut Event<'_>) -> Result<()> + Send + Sync>;

/// Built-in handlers of the trash behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrashHandler {
    /// Turns a delete into a trash (`Model.beforeDelete`)
    SoftDelete,
    /// Adds the "not trashed" condition to reads (`Model.beforeFind`)
    Filter,
}

impl TrashHandler {
    /// The event this handler must be bound to.
    pub fn event(self) -> ModelEvent {
        match self {
            TrashHandler::SoftDelete => ModelEvent::BeforeDelete,
            TrashHandler::Filter => ModelEvent::BeforeFind,
        }
    }

    /// The built-in handler named by the event's suffix, if there is one.
    pub fn for_event(event: ModelEvent) -> Option<Self> {
        match event {
            ModelEvent::BeforeDelete => Some(TrashHandler::SoftDelete),
            ModelEvent::BeforeFind => Some(TrashHandler::Filter),
            _ => None,
        }
    }
}

/// A registered listener body.
#[derive(Clone)]
pub enum Handler {
    Trash(TrashHandler),
    Callback(EventCallback),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Trash(handler) => f.debug_tuple("Trash").field(handler).finish(),
            Handler::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Debug, Clone)]
struct Listener {
    event: ModelEvent,
    priority: i32,
    handler: Handler,
}

/// Ordered listener registry of one table.
#[derive(Debug, Clone, Default)]
pub struct EventManager {
    listeners: Vec<Listener>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback with the default priority.
    pub fn on<F>(&mut self, event: ModelEvent, callback: F)
    where
        F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on_with_priority(event, DEFAULT_PRIORITY, callback);
    }

    /// Register a callback; lower priorities run first.
    pub fn on_with_priority<F>(&mut self, event: ModelEvent, priority: i32, callback: F)
    where
        F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add(event, priority, Handler::Callback(Arc::new(callback)));
    }

    /// Register any handler. Listeners stay sorted by priority; equal
    /// priorities keep registration order.
    pub fn add(&mut self, event: ModelEvent, priority: i32, handler: Handler) {
        let at = self.listeners.partition_point(|l| l.priority <= priority);
        self.listeners.insert(
            at,
            Listener {
                event,
                priority,
                handler,
            },
        );
    }

    /// Handlers for `event`, in dispatch order.
    pub fn handlers(&self, event: ModelEvent) -> Vec<Handler> {
        self.listeners
            .iter()
            .filter(|l| l.event == event)
            .map(|l| l.handler.clone())
            .collect()
    }

    /// Priorities registered for `event`, in dispatch order.
    pub fn priorities(&self, event: ModelEvent) -> Vec<i32> {
        self.listeners
            .iter()
            .filter(|l| l.event == event)
            .map(|l| l.priority)
            .collect()
    }

    pub fn has_listeners(&self, event: ModelEvent) -> bool {
        self.listeners.iter().any(|l| l.event == event)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
