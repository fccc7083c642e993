//! Process-wide defaults.
//!
//! The only setting is the fallback trash field, consulted when a table has
//! neither a configured field nor a `deleted`/`trashed` column.

use std::sync::RwLock;

static DEFAULT_TRASH_FIELD: RwLock<Option<String>> = RwLock::new(None);

/// Set the fallback trash field for every table.
pub fn set_default_trash_field(field: impl Into<String>) {
    let field = field.into();
    tracing::debug!(field = %field, "Setting default trash field");
    *DEFAULT_TRASH_FIELD
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(field);
}

pub fn clear_default_trash_field() {
    *DEFAULT_TRASH_FIELD
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
}

/// The fallback trash field, if one is set and non-empty.
pub fn default_trash_field() -> Option<String> {
    DEFAULT_TRASH_FIELD
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
        .filter(|field| !field.is_empty())
}
