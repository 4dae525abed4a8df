//! Database schema definitions

/// SQL to create the counties table
pub const CREATE_COUNTIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS counties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
)
"#;

/// SQL to create the places table
///
/// `(name, county_id)` is resolved by lookup, not constrained.
pub const CREATE_PLACES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS places (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    county_id INTEGER NOT NULL REFERENCES counties(id)
)
"#;

/// SQL to create the postal_codes table
pub const CREATE_POSTAL_CODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS postal_codes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    postal_code TEXT NOT NULL,
    place_id INTEGER NOT NULL REFERENCES places(id)
)
"#;

/// SQL to create the api_tokens table
/// Only the blake3 hash of a token is stored
pub const CREATE_API_TOKENS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS api_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_used_at TEXT,
    revoked INTEGER NOT NULL DEFAULT 0
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_places_county ON places(county_id)",
    "CREATE INDEX IF NOT EXISTS idx_places_name_county ON places(name, county_id)",
    "CREATE INDEX IF NOT EXISTS idx_postal_codes_place ON postal_codes(place_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_COUNTIES_TABLE,
        CREATE_PLACES_TABLE,
        CREATE_POSTAL_CODES_TABLE,
        CREATE_API_TOKENS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
