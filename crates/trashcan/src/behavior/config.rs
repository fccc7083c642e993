//! Trash behavior configuration.
//!
//! Event wiring is a typed, ordered list of bindings that is validated once
//! when the behavior is built.

use std::collections::HashSet;
use std::sync::Arc;

use trashcan_core::{Error, Result};

use crate::events::{DEFAULT_PRIORITY, Event, EventCallback, Handler, ModelEvent, TrashHandler};

/// Which events the behavior listens to.
#[derive(Debug, Clone, Default)]
pub enum EventsConfig {
    /// `Model.beforeDelete` and `Model.beforeFind` with their built-in handlers
    #[default]
    Default,
    /// No listeners at all; trash operations can still be called directly
    Disabled,
    /// Explicit bindings, in registration order. Empty means `Default`.
    List(Vec<EventBinding>),
}

/// One entry of [`EventsConfig::List`].
#[derive(Debug, Clone)]
pub struct EventBinding {
    pub event: ModelEvent,
    pub handler: Option<Handler>,
    /// Overrides [`TrashConfig::priority`] for this binding
    pub priority: Option<i32>,
}

impl EventBinding {
    /// Bind `event` to the built-in handler its suffix names.
    pub fn new(event: ModelEvent) -> Self {
        Self {
            event,
            handler: TrashHandler::for_event(event).map(Handler::Trash),
            priority: None,
        }
    }

    /// Parse a dotted event name, e.g. `Model.beforeDelete`.
    pub fn parse(name: &str) -> Result<Self> {
        ModelEvent::parse(name).map(Self::new)
    }

    /// Bind `event` to a specific built-in handler.
    pub fn handler(event: ModelEvent, handler: TrashHandler) -> Self {
        Self {
            event,
            handler: Some(Handler::Trash(handler)),
            priority: None,
        }
    }

    /// Bind `event` to a callback instead of a built-in handler.
    pub fn callback<F>(event: ModelEvent, callback: F) -> Self
    where
        F: Fn(&mut Event<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        Self {
            event,
            handler: Some(Handler::Callback(callback)),
            priority: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A validated binding, as registered on the table.
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    pub event: ModelEvent,
    pub handler: Handler,
    pub priority: i32,
}

/// Configuration of a [`TrashBehavior`](super::TrashBehavior).
#[derive(Debug, Clone)]
pub struct TrashConfig {
    /// Trash column. `None` or an empty string means auto-detect.
    pub field: Option<String>,
    /// Priority of bindings that do not carry their own
    pub priority: i32,
    pub events: EventsConfig,
    /// Trash dependent associations before the record itself
    pub cascade_on_trash: bool,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            field: None,
            priority: DEFAULT_PRIORITY,
            events: EventsConfig::Default,
            cascade_on_trash: true,
        }
    }
}

impl TrashConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn events(mut self, events: EventsConfig) -> Self {
        self.events = events;
        self
    }

    pub fn cascade_on_trash(mut self, value: bool) -> Self {
        self.cascade_on_trash = value;
        self
    }

    /// The configured field, treating an empty string as unset.
    pub fn configured_field(&self) -> Option<&str> {
        self.field.as_deref().filter(|field| !field.is_empty())
    }

    /// Validate the event bindings and resolve their priorities.
    pub fn resolve_events(&self) -> Result<Vec<ResolvedBinding>> {
        let bindings = match &self.events {
            EventsConfig::Disabled => return Ok(Vec::new()),
            EventsConfig::List(list) if !list.is_empty() => list.clone(),
            EventsConfig::Default | EventsConfig::List(_) => vec![
                EventBinding::new(ModelEvent::BeforeDelete),
                EventBinding::new(ModelEvent::BeforeFind),
            ],
        };

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if !seen.insert(binding.event) {
                return Err(Error::InvalidEventConfig(format!(
                    "event '{}' is bound more than once",
                    binding.event
                )));
            }
            let handler = match binding.handler {
                Some(Handler::Trash(handler)) if handler.event() != binding.event => {
                    return Err(Error::InvalidEventConfig(format!(
                        "handler {:?} cannot be bound to '{}', it handles '{}'",
                        handler,
                        binding.event,
                        handler.event()
                    )));
                }
                Some(handler) => handler,
                None => {
                    return Err(Error::InvalidEventConfig(format!(
                        "no handler for event '{}'",
                        binding.event
                    )));
                }
            };
            resolved.push(ResolvedBinding {
                event: binding.event,
                handler,
                priority: binding.priority.unwrap_or(self.priority),
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(config: &TrashConfig) -> Vec<(ModelEvent, i32)> {
        config
            .resolve_events()
            .unwrap()
            .into_iter()
            .map(|b| (b.event, b.priority))
            .collect()
    }

    #[test]
    fn default_binds_delete_and_find() {
        let config = TrashConfig::new();
        assert_eq!(
            events(&config),
            vec![(ModelEvent::BeforeDelete, 10), (ModelEvent::BeforeFind, 10)]
        );
        let empty = TrashConfig::new().events(EventsConfig::List(Vec::new()));
        assert_eq!(events(&empty), events(&config));
    }

    #[test]
    fn disabled_binds_nothing() {
        let config = TrashConfig::new().events(EventsConfig::Disabled);
        assert!(config.resolve_events().unwrap().is_empty());
    }

    #[test]
    fn binding_priority_overrides_config_priority() {
        let config = TrashConfig::new().priority(3).events(EventsConfig::List(vec![
            EventBinding::parse("Model.beforeFind").unwrap(),
            EventBinding::parse("Model.beforeDelete").unwrap().priority(1),
        ]));
        assert_eq!(
            events(&config),
            vec![(ModelEvent::BeforeFind, 3), (ModelEvent::BeforeDelete, 1)]
        );
    }

    #[test]
    fn parse_resolves_handler_from_suffix() {
        let binding = EventBinding::parse("Model.beforeDelete").unwrap();
        assert!(matches!(
            binding.handler,
            Some(Handler::Trash(TrashHandler::SoftDelete))
        ));
        assert!(EventBinding::parse("Model.afterSave").unwrap().handler.is_none());
        assert!(matches!(
            EventBinding::parse("beforeDelete"),
            Err(Error::InvalidEventConfig(_))
        ));
    }

    #[test]
    fn rejects_invalid_bindings() {
        let no_handler = TrashConfig::new().events(EventsConfig::List(vec![EventBinding::new(
            ModelEvent::AfterSave,
        )]));
        assert!(matches!(
            no_handler.resolve_events(),
            Err(Error::InvalidEventConfig(msg)) if msg.contains("Model.afterSave")
        ));

        let wrong_event = TrashConfig::new().events(EventsConfig::List(vec![EventBinding::handler(
            ModelEvent::BeforeSave,
            TrashHandler::SoftDelete,
        )]));
        assert!(wrong_event.resolve_events().is_err());

        let duplicate = TrashConfig::new().events(EventsConfig::List(vec![
            EventBinding::new(ModelEvent::BeforeFind),
            EventBinding::new(ModelEvent::BeforeFind),
        ]));
        assert!(duplicate.resolve_events().is_err());
    }

    #[test]
    fn callbacks_may_bind_any_event() {
        let config = TrashConfig::new().events(EventsConfig::List(vec![
            EventBinding::callback(ModelEvent::AfterSave, |_| Ok(())).priority(20),
        ]));
        let resolved = config.resolve_events().unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(matches!(resolved[0].handler, Handler::Callback(_)));
        assert_eq!(resolved[0].priority, 20);
    }

    #[test]
    fn empty_field_means_unset() {
        assert_eq!(TrashConfig::new().field("").configured_field(), None);
        assert_eq!(
            TrashConfig::new().field("deleted").configured_field(),
            Some("deleted")
        );
    }
}
