//! Record (entity) representation.
//!
//! A [`Record`] is a field → value map that remembers whether it came from the
//! store, which fields changed since it was last saved, the associated records
//! attached to it, and the validation errors of its last failed save.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::Value;

/// Records attached to a parent under one association name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Associated {
    /// The attached records, in order
    pub records: Vec<Record>,
    /// Whether the caller replaced this list since the parent was loaded
    #[serde(default)]
    pub dirty: bool,
}

/// A single table row as seen by the table layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: BTreeMap<String, Value>,
    #[serde(default)]
    dirty: BTreeSet<String>,
    #[serde(default)]
    persisted: bool,
    #[serde(default)]
    associated: BTreeMap<String, Associated>,
    #[serde(skip)]
    errors: ValidationError,
}

impl Record {
    /// Create an empty, new (not persisted) record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clean record representing a stored row.
    pub fn persisted<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            persisted: true,
            ..Self::default()
        }
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Builder form of [`Record::set_associated`].
    pub fn with_associated(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.set_associated(name, records);
        self
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Present and non-null.
    pub fn has(&self, field: &str) -> bool {
        self.values.get(field).is_some_and(|v| !v.is_null())
    }

    /// Set a field value and mark it dirty.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        self.values.insert(field.clone(), value.into());
        self.dirty.insert(field);
    }

    /// Set a field value without marking it dirty (used when hydrating keys).
    pub fn set_clean(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        self.dirty.remove(&field);
        self.values.insert(field, value.into());
    }

    /// Values of `fields` in order; absent fields yield `Value::Null`.
    pub fn extract<S: AsRef<str>>(&self, fields: &[S]) -> Vec<Value> {
        fields
            .iter()
            .map(|f| self.values.get(f.as_ref()).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Fields of `fields` that are absent or null.
    pub fn missing<'a, S: AsRef<str>>(&self, fields: &'a [S]) -> Vec<&'a str> {
        fields
            .iter()
            .map(AsRef::as_ref)
            .filter(|f| !self.has(f))
            .collect()
    }

    /// Iterate over all field/value pairs.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field/value pairs of dirty fields only.
    pub fn dirty_values(&self) -> Vec<(String, Value)> {
        self.dirty
            .iter()
            .filter_map(|f| self.values.get(f).map(|v| (f.clone(), v.clone())))
            .collect()
    }

    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Names of fields changed since the last save.
    pub fn dirty_fields(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    /// True when any field or attached association changed since the last save.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.associated.values().any(|a| a.dirty)
    }

    /// Clear every dirty flag, including those of attached associations.
    pub fn mark_clean(&mut self) {
        self.dirty.clear();
        for assoc in self.associated.values_mut() {
            assoc.dirty = false;
        }
    }

    /// Mark the record as stored and clean.
    pub fn mark_persisted(&mut self) {
        self.persisted = true;
        self.mark_clean();
    }

    /// Attach records under an association name and flag the list dirty.
    pub fn set_associated(&mut self, name: impl Into<String>, records: Vec<Record>) {
        self.associated.insert(
            name.into(),
            Associated {
                records,
                dirty: true,
            },
        );
    }

    /// Attach records loaded from the store (not dirty).
    pub fn set_loaded(&mut self, name: impl Into<String>, records: Vec<Record>) {
        self.associated.insert(
            name.into(),
            Associated {
                records,
                dirty: false,
            },
        );
    }

    /// Records attached under `name`, if any were attached.
    pub fn associated(&self, name: &str) -> Option<&[Record]> {
        self.associated.get(name).map(|a| a.records.as_slice())
    }

    pub fn associated_mut(&mut self, name: &str) -> Option<&mut Associated> {
        self.associated.get_mut(name)
    }

    pub fn take_associated(&mut self, name: &str) -> Option<Associated> {
        self.associated.remove(name)
    }

    pub fn put_associated(&mut self, name: impl Into<String>, associated: Associated) {
        self.associated.insert(name.into(), associated);
    }

    /// Validation errors of the last failed save.
    pub fn errors(&self) -> &ValidationError {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: ValidationError) {
        self.errors = errors;
    }

    pub fn clear_errors(&mut self) {
        self.errors = ValidationError::new();
    }

    /// Stable textual form of the given key fields, e.g. `1` or `1,3`.
    pub fn key_string<S: AsRef<str>>(&self, fields: &[S]) -> String {
        key_string(&self.extract(fields))
    }
}

/// Join key values into a stable textual form.
pub fn key_string(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
