pub mod company;
pub mod job;

pub use company::{Company, CompanyDetail, CompanyFilter, CompanyRepository, CompanyUpdate, NewCompany};
pub use job::{Job, JobFilter, JobRepository, JobUpdate, NewJob};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::{DatabaseError, FragmentError};

/// Errors raised by the entity repositories.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FragmentError> for ModelError {
    fn from(err: FragmentError) -> Self {
        ModelError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(DatabaseError::Sqlx(err))
    }
}

/// Reject partial updates touching identity fields or columns the entity does
/// not expose. Runs before any statement is built.
fn check_update_fields(
    data: &Map<String, Value>,
    immutable: &[&str],
    updatable: &[&str],
) -> Result<(), ModelError> {
    if data.keys().any(|key| immutable.contains(&key.as_str())) {
        return Err(ModelError::Validation(format!(
            "Cannot modify {}",
            immutable.join(" or ")
        )));
    }
    if let Some(key) = data.keys().find(|key| !updatable.contains(&key.as_str())) {
        return Err(ModelError::Validation(format!("Unknown field: {}", key)));
    }
    Ok(())
}

/// Field of a PATCH body whose column is nullable: a missing key stays
/// `None`, an explicit `null` becomes `Some(None)`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Translate constraint violations from INSERT/UPDATE into domain errors.
fn classify_write_error(
    err: sqlx::Error,
    conflict: impl FnOnce() -> String,
    missing: impl FnOnce() -> String,
) -> ModelError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => ModelError::Conflict(conflict()),
        Some(db) if db.is_foreign_key_violation() => ModelError::Validation(missing()),
        Some(db) if db.is_check_violation() => ModelError::Validation(db.message().to_string()),
        _ => err.into(),
    }
}
