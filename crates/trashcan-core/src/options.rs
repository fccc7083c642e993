//! Per-call operation options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Options passed to save, delete and trash operations.
///
/// The typed flags drive the table layer; `extra` carries caller options that
/// must reach listeners of cascaded operations untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationOptions {
    /// `false` when the operation was started by a cascade rather than the caller
    #[serde(rename = "_primary")]
    pub primary: bool,
    /// Physically delete even when the table supports trash
    pub purge: bool,
    /// Run table validation rules on save
    #[serde(rename = "checkRules")]
    pub check_rules: bool,
    /// Set by the trash handler when a delete was turned into a trash
    #[serde(rename = "softDeleted")]
    pub soft_deleted: bool,
    /// Free-form caller options
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            primary: true,
            purge: false,
            check_rules: true,
            soft_deleted: false,
            extra: Map::new(),
        }
    }
}

impl OperationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a physical delete.
    pub fn purge() -> Self {
        Self {
            purge: true,
            ..Self::default()
        }
    }

    /// Set a free-form option.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn check_rules(mut self, value: bool) -> Self {
        self.check_rules = value;
        self
    }

    /// Get a free-form option.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.extra.get(key)
    }

    /// The options a cascaded operation receives: everything the caller
    /// passed, minus the primary flag and per-operation results.
    pub fn cascaded(&self) -> Self {
        Self {
            primary: false,
            soft_deleted: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = OperationOptions::default();
        assert!(opts.primary);
        assert!(opts.check_rules);
        assert!(!opts.purge);
        assert!(!opts.soft_deleted);
    }

    #[test]
    fn cascaded_keeps_extras_and_drops_primary() {
        let mut opts = OperationOptions::purge().with("deleteOptions", true);
        opts.soft_deleted = true;
        let child = opts.cascaded();
        assert!(!child.primary);
        assert!(child.purge);
        assert!(!child.soft_deleted);
        assert_eq!(child.get("deleteOptions"), Some(&JsonValue::Bool(true)));
    }

    #[test]
    fn serializes_flat() {
        let opts = OperationOptions::new().with("foo", "bar");
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["_primary"], JsonValue::Bool(true));
        assert_eq!(json["foo"], JsonValue::from("bar"));
        let back: OperationOptions = serde_json::from_value(json).unwrap();
        assert_eq!(back, opts);
    }
}
