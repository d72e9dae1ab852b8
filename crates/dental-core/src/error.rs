//! Error taxonomy for the dental core.

use thiserror::Error;

use crate::chart::SurfaceConflict;
use crate::db::DbError;

/// Errors raised by chart, plan and consultation operations.
///
/// Everything here is fatal to the enclosing unit of work. Best-effort
/// upstream failures use [`crate::external::UpstreamError`] instead and never
/// convert into this type.
#[derive(Error, Debug)]
pub enum DentalError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Surface already treated: tooth {} {}", .0.tooth_number, .0.surface)]
    SurfaceConflict(Box<SurfaceConflict>),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DentalError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DentalError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DentalError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        DentalError::InvalidState(message.into())
    }
}

impl From<SurfaceConflict> for DentalError {
    fn from(conflict: SurfaceConflict) -> Self {
        DentalError::SurfaceConflict(Box::new(conflict))
    }
}

impl From<rusqlite::Error> for DentalError {
    fn from(e: rusqlite::Error) -> Self {
        DentalError::Database(DbError::Sqlite(e))
    }
}

pub type DentalResult<T> = Result<T, DentalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = DentalError::validation("stageName", "must not be empty");
        assert_eq!(err.to_string(), "Invalid stageName: must not be empty");
    }

    #[test]
    fn test_not_found_message() {
        let err = DentalError::not_found("Treatment plan", "abc");
        assert_eq!(err.to_string(), "Treatment plan not found: abc");
    }
}
