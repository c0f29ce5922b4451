//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the checkpoint database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Latest resumable snapshot of each named crawl
CREATE TABLE IF NOT EXISTS checkpoints (
    name TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    state TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    file_count INTEGER NOT NULL,
    buffered INTEGER NOT NULL,
    cell_index INTEGER NOT NULL,
    category_index INTEGER NOT NULL,
    page_index INTEGER NOT NULL,
    done INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per start of a crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    start_record_count INTEGER NOT NULL DEFAULT 0,
    end_record_count INTEGER
);

CREATE INDEX IF NOT EXISTS idx_runs_name ON runs(name);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
