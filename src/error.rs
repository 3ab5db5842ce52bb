//! Error types shared by the storage layer and the services.
//!
//! Absence of an entity is never an error here: lookups return `Option`.

use thiserror::Error;

use crate::entities::{CompanyId, PersonId};

/// Failures raised by a storage collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    /// A link/unlink named a row that does not exist
    #[error("dangling reference: {0}")]
    Dangling(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by the relationship services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// There is no direct change-employer transition
    #[error("person {person} is already employed by company {company}")]
    AlreadyEmployed { person: PersonId, company: CompanyId },
}

pub type ServiceResult<T> = Result<T, ServiceError>;
