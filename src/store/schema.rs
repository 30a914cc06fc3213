//! Counter table schema and migrations.
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

use super::StoreError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: one counter table per n-gram order. Keys are unique per
    // table; counts start at 1 on first insert and only ever grow.
    r#"
    CREATE TABLE IF NOT EXISTS characters (
        char    TEXT PRIMARY KEY,
        count   INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS bigrams (
        bigram  TEXT PRIMARY KEY,
        count   INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS trigrams (
        trigram TEXT PRIMARY KEY,
        count   INTEGER NOT NULL DEFAULT 1
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "running counter schema migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {version}"), [])?;
        }
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
