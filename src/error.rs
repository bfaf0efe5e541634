use thiserror::Error;

use crate::validation::ValidationError;

/// Errors raised by the entity layer, its stores and services.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("validation failed: {}", format_validation(.0))]
    Validation(Vec<ValidationError>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{what} numbers exhausted after {last}")]
    NumberSpaceExhausted { what: &'static str, last: i64 },

    #[error("unknown {what}: {value}")]
    UnknownVariant { what: &'static str, value: String },

    #[error("invalid validation pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BankError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BankError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            BankError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type BankResult<T> = Result<T, BankError>;
