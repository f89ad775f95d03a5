//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the revmon database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registered review sources
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    last_crawl_attempt_at TEXT
);

-- Collected reviews; review_hash is the global identity
CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL REFERENCES sources(id),
    review_hash TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    rating INTEGER,
    is_receipt INTEGER NOT NULL DEFAULT 0,
    date_text TEXT,
    snapshot_path TEXT,
    collected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reviews_source ON reviews(source_id);
CREATE INDEX IF NOT EXISTS idx_reviews_collected ON reviews(collected_at);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);

    if version.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![SCHEMA_VERSION, chrono::Utc::now().to_rfc3339()],
        )?;
    }

    Ok(())
}
