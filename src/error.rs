//! Service-level error taxonomy shared by the directory, ledgers and
//! reporting. The HTTP layer maps each variant to a status code.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum CareError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Insufficient wallet balance: have {balance}, need {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service failed: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for CareError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                CareError::NotFound(format!("{entity_type} {id}"))
            }
            DatabaseError::VersionMismatch { .. } => CareError::Conflict(err.to_string()),
            e if e.is_constraint_violation() => CareError::Conflict(e.to_string()),
            e => CareError::Database(e),
        }
    }
}

impl From<rusqlite::Error> for CareError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}
