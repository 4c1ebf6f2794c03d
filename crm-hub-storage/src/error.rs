//! Storage error types

use crm_hub_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    /// A N1QL statement was rejected or its rows could not be read
    #[error("Query error: {0}")]
    Query(String),

    /// The stored record refused the change
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
