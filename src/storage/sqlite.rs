//! SQLite storage implementation

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter};
use rusqlite::types::Value;
use serde::Serialize;
use crate::{Result, Error};
use crate::model::{County, Place, PostalCode};
use super::schema;

/// SQLite-backed storage for counties, places, postal codes and API tokens
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// How long a writer waits on a locked database before failing
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = OFF")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Begin an immediate transaction; it rolls back on drop unless committed.
    ///
    /// The write lock is taken at `BEGIN`, so a read-then-write sequence
    /// never fails to upgrade while another connection writes. Store methods
    /// called while the transaction is open run inside it.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }

    // ========== County Operations ==========

    /// Insert a county; a taken name yields `Error::Conflict`
    pub fn insert_county(&self, name: &str) -> Result<County> {
        self.conn
            .execute("INSERT INTO counties (name) VALUES (?1)", [name])
            .map_err(|e| unique_violation_to_conflict(e, "counties.name", name))?;
        Ok(County { id: self.conn.last_insert_rowid(), name: name.to_string() })
    }

    /// Insert a county unless the name already exists.
    ///
    /// Returns `None` when another row holds the name.
    pub fn insert_county_or_ignore(&self, name: &str) -> Result<Option<County>> {
        let inserted = self.conn.execute(
            "INSERT INTO counties (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            [name],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(County { id: self.conn.last_insert_rowid(), name: name.to_string() }))
    }

    /// Get a county by id
    pub fn get_county(&self, id: i64) -> Result<Option<County>> {
        self.conn
            .query_row("SELECT id, name FROM counties WHERE id = ?1", [id], row_to_county)
            .optional()
            .map_err(Into::into)
    }

    /// Find a county by exact name
    pub fn find_county_by_name(&self, name: &str) -> Result<Option<County>> {
        self.conn
            .query_row("SELECT id, name FROM counties WHERE name = ?1", [name], row_to_county)
            .optional()
            .map_err(Into::into)
    }

    /// Whether a county other than `except` already uses `name`
    pub fn county_name_taken(&self, name: &str, except: Option<i64>) -> Result<bool> {
        let taken: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM counties WHERE name = ?1 AND id != ?2)",
            params![name, except.unwrap_or(0)],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// List counties by id, optionally restricted to names containing `needle`
    pub fn list_counties(&self, needle: Option<&str>) -> Result<Vec<County>> {
        let (clause, values) = match needle {
            Some(needle) => (
                " WHERE name LIKE ?1 ESCAPE '\\'",
                vec![Value::Text(format!("%{}%", escape_like(needle)))],
            ),
            None => ("", Vec::new()),
        };
        let sql = format!("SELECT id, name FROM counties{} ORDER BY id", clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let counties = stmt
            .query_map(params_from_iter(values.iter()), row_to_county)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counties)
    }

    /// Counties keyed by id for the given ids (missing ids are absent)
    pub fn counties_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, County>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT id, name FROM counties WHERE id IN ({})", placeholders(ids.len()));
        let mut stmt = self.conn.prepare(&sql)?;
        let counties = stmt
            .query_map(params_from_iter(ids.iter()), row_to_county)?
            .map(|r| r.map(|c| (c.id, c)))
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counties)
    }

    /// Rename a county; a taken name yields `Error::Conflict`
    pub fn update_county_name(&self, id: i64, name: &str) -> Result<()> {
        self.conn
            .execute("UPDATE counties SET name = ?1 WHERE id = ?2", params![name, id])
            .map_err(|e| unique_violation_to_conflict(e, "counties.name", name))?;
        Ok(())
    }

    /// Delete a county; returns false when no row matched
    pub fn delete_county(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM counties WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // ========== Place Operations ==========

    /// Insert a place
    pub fn insert_place(&self, name: &str, county_id: i64) -> Result<Place> {
        self.conn.execute(
            "INSERT INTO places (name, county_id) VALUES (?1, ?2)",
            params![name, county_id],
        )?;
        Ok(Place {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            county_id,
        })
    }

    /// Get a place by id
    pub fn get_place(&self, id: i64) -> Result<Option<Place>> {
        self.conn
            .query_row(
                "SELECT id, name, county_id FROM places WHERE id = ?1",
                [id],
                row_to_place,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find the first place with this name in this county
    pub fn find_place(&self, name: &str, county_id: i64) -> Result<Option<Place>> {
        self.conn
            .query_row(
                "SELECT id, name, county_id FROM places WHERE name = ?1 AND county_id = ?2 ORDER BY id LIMIT 1",
                params![name, county_id],
                row_to_place,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Places of one county
    pub fn places_in_county(&self, county_id: i64) -> Result<Vec<Place>> {
        self.list_places(Some(county_id), None)
    }

    /// List places, optionally by county and by name prefix
    pub fn list_places(&self, county_id: Option<i64>, prefix: Option<&str>) -> Result<Vec<Place>> {
        let (clause, values) = place_filter(county_id, prefix);
        let sql = format!("SELECT id, name, county_id FROM places{} ORDER BY id", clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let places = stmt
            .query_map(params_from_iter(values.iter()), row_to_place)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(places)
    }

    /// Names of all places, optionally restricted to one county
    pub fn place_names(&self, county_id: Option<i64>) -> Result<Vec<String>> {
        let (clause, values) = place_filter(county_id, None);
        let sql = format!("SELECT name FROM places{}", clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Places keyed by id for the given ids
    pub fn places_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Place>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT id, name, county_id FROM places WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let places = stmt
            .query_map(params_from_iter(ids.iter()), row_to_place)?
            .map(|r| r.map(|p| (p.id, p)))
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(places)
    }

    /// Overwrite whichever of name / county_id is supplied
    pub fn update_place(&self, id: i64, name: Option<&str>, county_id: Option<i64>) -> Result<()> {
        let mut sets = Vec::new();
        let mut values = Vec::new();
        if let Some(name) = name {
            values.push(Value::Text(name.to_string()));
            sets.push(format!("name = ?{}", values.len()));
        }
        if let Some(county_id) = county_id {
            values.push(Value::Integer(county_id));
            sets.push(format!("county_id = ?{}", values.len()));
        }
        if sets.is_empty() {
            return Ok(());
        }
        values.push(Value::Integer(id));
        let sql = format!("UPDATE places SET {} WHERE id = ?{}", sets.join(", "), values.len());
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Delete a place; returns false when no row matched
    pub fn delete_place(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM places WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // ========== Postal Code Operations ==========

    /// Insert a postal code
    pub fn insert_postal_code(&self, postal_code: &str, place_id: i64) -> Result<PostalCode> {
        self.conn.execute(
            "INSERT INTO postal_codes (postal_code, place_id) VALUES (?1, ?2)",
            params![postal_code, place_id],
        )?;
        Ok(PostalCode {
            id: self.conn.last_insert_rowid(),
            postal_code: postal_code.to_string(),
            place_id,
        })
    }

    /// Get a postal code by id
    pub fn get_postal_code(&self, id: i64) -> Result<Option<PostalCode>> {
        self.conn
            .query_row(
                "SELECT id, postal_code, place_id FROM postal_codes WHERE id = ?1",
                [id],
                row_to_postal_code,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All postal codes by id
    pub fn list_postal_codes(&self) -> Result<Vec<PostalCode>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, postal_code, place_id FROM postal_codes ORDER BY id")?;
        let codes = stmt
            .query_map([], row_to_postal_code)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(codes)
    }

    /// Postal codes grouped by place id for the given places
    pub fn postal_codes_by_place_ids(&self, place_ids: &[i64]) -> Result<HashMap<i64, Vec<PostalCode>>> {
        let mut grouped: HashMap<i64, Vec<PostalCode>> = HashMap::new();
        if place_ids.is_empty() {
            return Ok(grouped);
        }
        let sql = format!(
            "SELECT id, postal_code, place_id FROM postal_codes WHERE place_id IN ({}) ORDER BY id",
            placeholders(place_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        for code in stmt.query_map(params_from_iter(place_ids.iter()), row_to_postal_code)? {
            let code = code?;
            grouped.entry(code.place_id).or_default().push(code);
        }
        Ok(grouped)
    }

    /// Overwrite whichever of postal_code / place_id is supplied
    pub fn update_postal_code(&self, id: i64, postal_code: Option<&str>, place_id: Option<i64>) -> Result<()> {
        let mut sets = Vec::new();
        let mut values = Vec::new();
        if let Some(code) = postal_code {
            values.push(Value::Text(code.to_string()));
            sets.push(format!("postal_code = ?{}", values.len()));
        }
        if let Some(place_id) = place_id {
            values.push(Value::Integer(place_id));
            sets.push(format!("place_id = ?{}", values.len()));
        }
        if sets.is_empty() {
            return Ok(());
        }
        values.push(Value::Integer(id));
        let sql = format!("UPDATE postal_codes SET {} WHERE id = ?{}", sets.join(", "), values.len());
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Delete a postal code; returns false when no row matched
    pub fn delete_postal_code(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM postal_codes WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // ========== API Token Operations ==========

    /// Store a token hash under a label
    pub fn insert_token(&self, name: &str, token_hash: &str) -> Result<ApiToken> {
        self.conn.execute(
            "INSERT INTO api_tokens (name, token_hash) VALUES (?1, ?2)",
            params![name, token_hash],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_token(id)?
            .ok_or_else(|| Error::Conflict(format!("token {} vanished after insert", id)))
    }

    /// Get a token by id, revoked or not
    pub fn get_token(&self, id: i64) -> Result<Option<ApiToken>> {
        self.conn
            .query_row(
                "SELECT id, name, created_at, last_used_at, revoked FROM api_tokens WHERE id = ?1",
                [id],
                row_to_token,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find a non-revoked token by its hash
    pub fn find_active_token(&self, token_hash: &str) -> Result<Option<ApiToken>> {
        self.conn
            .query_row(
                "SELECT id, name, created_at, last_used_at, revoked FROM api_tokens WHERE token_hash = ?1 AND revoked = 0",
                [token_hash],
                row_to_token,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Record that a token was just used
    pub fn touch_token(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE api_tokens SET last_used_at = CURRENT_TIMESTAMP WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }

    /// All tokens by id
    pub fn list_tokens(&self) -> Result<Vec<ApiToken>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at, last_used_at, revoked FROM api_tokens ORDER BY id",
        )?;
        let tokens = stmt
            .query_map([], row_to_token)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tokens)
    }

    /// Revoke a token; returns false when no active token matched
    pub fn revoke_token(&self, id: i64) -> Result<bool> {
        let revoked = self.conn.execute(
            "UPDATE api_tokens SET revoked = 1 WHERE id = ?1 AND revoked = 0",
            [id],
        )?;
        Ok(revoked > 0)
    }

    // ========== Statistics ==========

    fn count_rows(&self, table: &'static str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count all counties
    pub fn count_counties(&self) -> Result<usize> {
        self.count_rows("counties")
    }

    /// Count all places
    pub fn count_places(&self) -> Result<usize> {
        self.count_rows("places")
    }

    /// Count all postal codes
    pub fn count_postal_codes(&self) -> Result<usize> {
        self.count_rows("postal_codes")
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let active_tokens: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM api_tokens WHERE revoked = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(DbStats {
            counties: self.count_counties()?,
            places: self.count_places()?,
            postal_codes: self.count_postal_codes()?,
            active_tokens: active_tokens as usize,
        })
    }
}

fn row_to_county(row: &rusqlite::Row) -> rusqlite::Result<County> {
    Ok(County { id: row.get(0)?, name: row.get(1)? })
}

fn row_to_place(row: &rusqlite::Row) -> rusqlite::Result<Place> {
    Ok(Place { id: row.get(0)?, name: row.get(1)?, county_id: row.get(2)? })
}

fn row_to_postal_code(row: &rusqlite::Row) -> rusqlite::Result<PostalCode> {
    Ok(PostalCode { id: row.get(0)?, postal_code: row.get(1)?, place_id: row.get(2)? })
}

fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<ApiToken> {
    Ok(ApiToken {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        last_used_at: row.get(3)?,
        revoked: row.get(4)?,
    })
}

/// WHERE clause and bound values shared by place listings
fn place_filter(county_id: Option<i64>, prefix: Option<&str>) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    if let Some(county_id) = county_id {
        values.push(Value::Integer(county_id));
        conditions.push(format!("county_id = ?{}", values.len()));
    }
    if let Some(prefix) = prefix {
        values.push(Value::Text(format!("{}%", escape_like(prefix))));
        conditions.push(format!("name LIKE ?{} ESCAPE '\\'", values.len()));
    }
    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn unique_violation_to_conflict(err: rusqlite::Error, column: &str, value: &str) -> Error {
    if is_unique_violation(&err) {
        Error::Conflict(format!("{} '{}' already exists", column, value))
    } else {
        Error::Storage(err)
    }
}

/// API token metadata (the token itself is never stored)
#[derive(Debug, Clone, Serialize)]
pub struct ApiToken {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
    pub revoked: bool,
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub counties: usize,
    pub places: usize,
    pub postal_codes: usize,
    pub active_tokens: usize,
}
