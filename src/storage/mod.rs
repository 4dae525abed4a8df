//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - counties(id, name UNIQUE)
//! - places(id, name, county_id)
//! - postal_codes(id, postal_code, place_id)
//! - api_tokens(id, name, token_hash, created_at, last_used_at, revoked)
//!
//! Foreign keys are declared but not enforced: deletes never cascade and
//! orphaned children are kept.

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, ApiToken, DbStats};
