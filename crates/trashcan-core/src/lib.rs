//! Core types and traits for trashcan.
//!
//! This crate provides the data model the soft-delete layer works on:
//!
//! - `Value` and `Record` for dynamically typed rows with dirty tracking
//! - `TableSchema` and `Association` metadata
//! - `OperationOptions` passed through save/delete/trash calls and cascades
//! - `Clock` for trash timestamps
//! - table validation rules
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod association;
pub mod clock;
pub mod error;
pub mod options;
pub mod record;
pub mod schema;
pub mod validate;
pub mod value;

pub use association::{Association, AssociationKind, JoinTable, SaveStrategy};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{
    ConfigError, Error, FieldValidationError, QueryError, QueryErrorKind, Result, ValidationError,
    ValidationErrorKind,
};
pub use options::OperationOptions;
pub use record::{Associated, Record, key_string};
pub use schema::{Column, SqlType, TableSchema};
pub use validate::{Rule, check_rules};
pub use value::Value;

/// Unwrap an `Outcome`, returning early from the enclosing function or async
/// block with any non-`Ok` variant.
#[macro_export]
macro_rules! try_outcome {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(err) => return $crate::Outcome::Err(err),
            $crate::Outcome::Cancelled(reason) => return $crate::Outcome::Cancelled(reason),
            $crate::Outcome::Panicked(payload) => return $crate::Outcome::Panicked(payload),
        }
    };
}

/// Unwrap a `Result`, returning `Outcome::Err` from the enclosing function or
/// async block on failure.
#[macro_export]
macro_rules! try_result {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => return $crate::Outcome::Err(err.into()),
        }
    };
}
