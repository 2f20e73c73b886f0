//! Common error types for mediacat

use crate::db::schema_sync::SchemaError;
use thiserror::Error;

/// Common result type for mediacat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the catalog bootstrap and the HTTP server
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database server unreachable or database could not be created
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema reconciliation failure (fatal at startup)
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A natural key that must already exist was not found
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Import batch failure other than a uniqueness conflict
    #[error("Import error: {0}")]
    Import(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode error for configuration or import files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for failures that must stop the bootstrap process
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Resolution(_) | Error::Import(_) | Error::NotFound(_) | Error::InvalidInput(_)
        )
    }
}
