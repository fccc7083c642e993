//! Table validation rules run during save.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::error::ValidationError;
use crate::record::Record;

/// Thread-safe regex cache for compiled patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime
/// of the program.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// Returns `false` if the pattern is invalid (logs a warning).
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation rule, treating as non-match"
            );
            false
        }
    }
}

/// A single table rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Field must be non-null on new records, and stay non-null when changed.
    Required(String),
    /// Text field must not exceed `max` characters.
    MaxLength { field: String, max: usize },
    /// Text field must match a regex pattern.
    Pattern { field: String, pattern: String },
}

impl Rule {
    pub fn required(field: impl Into<String>) -> Self {
        Rule::Required(field.into())
    }

    pub fn max_length(field: impl Into<String>, max: usize) -> Self {
        Rule::MaxLength {
            field: field.into(),
            max,
        }
    }

    pub fn pattern(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Rule::Pattern {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    fn check(&self, record: &Record, errors: &mut ValidationError) {
        match self {
            Rule::Required(field) => {
                let touched = record.is_new() || record.get(field).is_some();
                if touched && !record.has(field) {
                    errors.add_required(field.clone());
                }
            }
            Rule::MaxLength { field, max } => {
                if let Some(text) = record.get(field).and_then(|v| v.as_str()) {
                    let len = text.chars().count();
                    if len > *max {
                        errors.add_max_length(field.clone(), *max, len);
                    }
                }
            }
            Rule::Pattern { field, pattern } => {
                if let Some(text) = record.get(field).and_then(|v| v.as_str()) {
                    if !matches_pattern(text, pattern) {
                        errors.add_pattern(field.clone(), pattern);
                    }
                }
            }
        }
    }
}

/// Check every rule against a record.
pub fn check_rules(rules: &[Rule], record: &Record) -> ValidationError {
    let mut errors = ValidationError::new();
    for rule in rules {
        rule.check(record, &mut errors);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn required_on_new_records() {
        let rules = [Rule::required("title")];
        assert_eq!(check_rules(&rules, &Record::new()).errors.len(), 1);
        assert!(check_rules(&rules, &Record::new().with("title", "x")).is_empty());
        // Persisted records that never loaded the field are not checked
        assert!(check_rules(&rules, &Record::persisted([("id", 1)])).is_empty());
        let mut r = Record::persisted([("id", 1)]);
        r.set("title", Value::Null);
        assert_eq!(check_rules(&rules, &r).errors.len(), 1);
    }

    #[test]
    fn max_length_counts_chars() {
        let rules = [Rule::max_length("body", 3)];
        assert!(check_rules(&rules, &Record::new().with("body", "äöü")).is_empty());
        let errors = check_rules(&rules, &Record::new().with("body", "abcd"));
        assert_eq!(
            errors.errors[0].message,
            "must be at most 3 characters, got 4"
        );
    }

    #[test]
    fn pattern_uses_cache() {
        assert!(matches_pattern("abc", "^[a-z]+$"));
        assert!(matches_pattern("xyz", "^[a-z]+$"));
        assert!(!matches_pattern("ABC", "^[a-z]+$"));
        assert!(!matches_pattern("abc", "(unclosed"));
        let rules = [Rule::pattern("name", "^[A-Z]")];
        assert!(!check_rules(&rules, &Record::new().with("name", "lower")).is_empty());
    }
}
