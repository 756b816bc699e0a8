//! Document layer error types.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::schema::FieldViolation;
use super::store::{FilterOp, StoreError};

/// A record failed schema validation on save or on read.
///
/// Carries every failing field so the message points straight at the bad
/// data instead of the first problem only.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelValidationError {
    pub model: String,
    pub doc_id: String,
    pub collection: String,
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ModelValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed for `{}(id='{}')` in collection `{}`:",
            self.model, self.doc_id, self.collection
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        write!(
            f,
            "\n\nHint: Check that the stored document for this record matches the `{}` schema.",
            self.model
        )
    }
}

impl std::error::Error for ModelValidationError {}

/// Errors from model registration at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Model '{model}' must declare a non-empty collection name")]
    EmptyCollection { model: String },

    #[error("Collection name '{collection}' of model '{model}' must not contain '/'")]
    InvalidCollection { model: String, collection: String },

    #[error("Model '{0}' is already registered")]
    Duplicate(String),

    #[error("Schema of model '{model}' must not declare the reserved field '{field}'")]
    ReservedField { model: String, field: String },
}

/// Errors from typed collection operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ModelValidationError),

    #[error("Validation failed for query ('{field}', '{op}', ...): {reason}")]
    InvalidFilter {
        field: String,
        op: FilterOp,
        value: Value,
        reason: String,
    },

    #[error("Validation failed for order_by field '{field}': {reason}")]
    InvalidOrdering { field: String, reason: String },

    #[error("Model '{0}' is not registered")]
    Unregistered(&'static str),

    #[error("Failed to encode {model}: {reason}")]
    Encode { model: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DocumentError {
    /// Whether the caller supplied bad input, as opposed to an upstream failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DocumentError::Validation(_)
                | DocumentError::InvalidFilter { .. }
                | DocumentError::InvalidOrdering { .. }
        )
    }
}
