//! # Zipcodes - county / place / postal code registry
//!
//! A small REST service over a three-level geographic hierarchy.
//!
//! Zipcodes provides:
//! - SQLite-backed storage for counties, places and postal codes
//! - Lookup-or-create resolution of county and place names for postal code writes
//! - Filtered, relation-expanded read queries
//! - Token-protected create/update/delete over HTTP
//! - CSV import and token management from the command line

pub mod model;
pub mod storage;
pub mod validation;
pub mod query;
pub mod mutation;
pub mod auth;
pub mod server;
pub mod import;
pub mod config;
pub mod ui;


// Re-exports for convenient access
pub use model::{County, Place, PostalCode};
pub use storage::SqliteStore;
pub use validation::ValidationErrors;

/// Result type alias for Zipcodes operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Zipcodes operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The given data was invalid.")]
    Validation(ValidationErrors),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("No record matches id '{0}'")]
    UnknownId(String),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
