//! The trash behavior.
//!
//! A [`TrashBehavior`] attached to a [`Table`](crate::Table) turns deletes into
//! trash marks and hides trashed rows from reads. The pieces live in their own
//! modules:
//!
//! - [`config`]: typed configuration and event bindings
//! - [`field`]: trash field resolution
//! - [`filter`]: the `beforeFind` condition and the `onlyTrashed`/`withTrashed` finders
//! - [`marker`]: trash, bulk trash, empty trash, restore
//! - [`cascade`]: propagation of trash and restore along dependent associations
//!
//! The operations themselves are methods on [`Session`](crate::Session).

pub mod cascade;
pub mod config;
pub mod field;
pub mod filter;
pub mod marker;

use std::sync::OnceLock;

use trashcan_core::Result;

pub use cascade::CascadeWalk;
pub use config::{EventBinding, EventsConfig, ResolvedBinding, TrashConfig};

/// Soft-delete behavior of one table.
#[derive(Debug)]
pub struct TrashBehavior {
    config: TrashConfig,
    events: Vec<ResolvedBinding>,
    /// Field resolved on first use
    field: OnceLock<String>,
}

impl TrashBehavior {
    /// Build the behavior, validating its event configuration.
    pub fn new(config: TrashConfig) -> Result<Self> {
        let events = config.resolve_events()?;
        Ok(Self {
            config,
            events,
            field: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &TrashConfig {
        &self.config
    }

    /// The event bindings the behavior registers on its table.
    pub fn implemented_events(&self) -> &[ResolvedBinding] {
        &self.events
    }

    pub fn cascade_on_trash(&self) -> bool {
        self.config.cascade_on_trash
    }

    /// The trash field, once it has been resolved.
    pub fn resolved_field(&self) -> Option<&str> {
        self.field.get().map(String::as_str)
    }
}
