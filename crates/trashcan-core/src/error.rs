//! Error types for trash operations.

use std::fmt;

/// The primary error type for all trashcan operations.
///
/// Ordinary save or delete failures are reported as `false` by the session
/// and are not errors. These variants cover misuse and store failures.
#[derive(Debug)]
pub enum Error {
    /// A record is missing one or more primary key fields
    MissingKey { table: String, fields: Vec<String> },
    /// No trash field could be resolved for a table
    MissingFieldConfig { table: String },
    /// An entity restore was attempted on a record with unsaved changes
    DirtyEntity { table: String, dirty: Vec<String> },
    /// The event configuration of a trash behavior is invalid
    InvalidEventConfig(String),
    /// No record matched the given primary key
    RecordNotFound { table: String, key: String },
    /// The table alias is not registered with the session
    UnknownTable(String),
    /// A custom finder was used on a table that does not provide it
    UnknownFinder { table: String, finder: String },
    /// The table declares no association with this name
    UnknownAssociation { table: String, name: String },
    /// A trash operation was invoked on a table without the trash behavior
    TrashNotSupported(String),
    /// Store/statement execution errors
    Query(QueryError),
    /// Configuration errors
    Config(ConfigError),
    /// Validation errors
    Validation(ValidationError),
    /// Anything else
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Unknown table or column
    NotFound,
    /// Constraint violation (duplicate key, missing key)
    Constraint,
    /// Statement or expression not supported by the store
    Unsupported,
    /// Other store error
    Database,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Validation error collected while checking table rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// The errors, in rule order
    pub errors: Vec<FieldValidationError>,
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

/// Which rule failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    Required,
    MaxLength,
    Pattern,
    Custom,
}

impl ValidationError {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a failure of `field`.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Required, "is required");
    }

    pub fn add_max_length(&mut self, field: impl Into<String>, max: usize, actual: usize) {
        self.add(
            field,
            ValidationErrorKind::MaxLength,
            format!("must be at most {max} characters, got {actual}"),
        );
    }

    pub fn add_pattern(&mut self, field: impl Into<String>, pattern: &str) {
        self.add(
            field,
            ValidationErrorKind::Pattern,
            format!("must match pattern '{pattern}'"),
        );
    }

    /// Errors recorded for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldValidationError> {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// `Err(self)` when anything failed.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Error {
    /// Shorthand for a store error with an optional statement attached.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>, sql: Option<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql,
            message: message.into(),
        })
    }

    /// SQL of the statement that failed, for store errors.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Is this a "table or column not found" store error?
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Query(QueryError {
                kind: QueryErrorKind::NotFound,
                ..
            }) | Error::RecordNotFound { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingKey { table, fields } => write!(
                f,
                "Cannot trash a record of '{}' without primary key value(s): {}",
                table,
                fields.join(", ")
            ),
            Error::MissingFieldConfig { table } => write!(
                f,
                "TrashBehavior: 'field' config needs to be provided for table '{}'",
                table
            ),
            Error::DirtyEntity { table, dirty } => write!(
                f,
                "Cannot restore a dirty record of '{}' (changed: {})",
                table,
                dirty.join(", ")
            ),
            Error::InvalidEventConfig(msg) => write!(f, "Invalid trash event config: {}", msg),
            Error::RecordNotFound { table, key } => {
                write!(f, "Record not found in table '{}' for key {}", table, key)
            }
            Error::UnknownTable(alias) => write!(f, "Unknown table '{}'", alias),
            Error::UnknownFinder { table, finder } => {
                write!(f, "Unknown finder method '{}' on table '{}'", finder, table)
            }
            Error::UnknownAssociation { table, name } => {
                write!(f, "Table '{}' is not associated with '{}'", table, name)
            }
            Error::TrashNotSupported(table) => {
                write!(f, "Table '{}' does not have the trash behavior", table)
            }
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{} (in `{}`)", self.message, sql),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

/// Result type alias for trashcan operations.
pub type Result<T> = std::result::Result<T, Error>;
