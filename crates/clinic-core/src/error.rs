//! Business-level errors shared by every component.

use thiserror::Error;

use crate::db::DbError;

/// Clinic operation errors.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Insufficient balance in package {package_id}: {available} available, {requested} requested"
    )]
    InsufficientBalance {
        package_id: String,
        available: f64,
        requested: f64,
    },

    #[error("Ad-hoc application of {0} has no catalog treatment")]
    MissingCatalogId(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl ClinicError {
    /// Stable machine-readable code, used in batch reports and API errors.
    pub fn code(&self) -> &'static str {
        match self {
            ClinicError::Validation(_) => "validation",
            ClinicError::Conflict(_) => "conflict",
            ClinicError::NotFound(_) => "not_found",
            ClinicError::InsufficientBalance { .. } => "insufficient_balance",
            ClinicError::MissingCatalogId(_) => "missing_catalog_id",
            ClinicError::Database(_) => "storage",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ClinicError::Validation(message.into())
    }
}

impl From<DbError> for ClinicError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ClinicError::NotFound(what),
            DbError::Duplicate(what) => ClinicError::Conflict(what),
            other => ClinicError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ClinicError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::from(e).into()
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::Database(DbError::Json(e))
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
