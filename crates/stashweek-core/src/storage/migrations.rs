//! Database schema migrations for stashweek.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Schema version produced by [`migrate`].
pub const CURRENT_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: challenges and their deposit ledger.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS challenges (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL DEFAULT '',
            icon            TEXT NOT NULL DEFAULT '',
            mode            TEXT NOT NULL,
            direction       TEXT NOT NULL,
            total_weeks     INTEGER NOT NULL,
            target_amount   INTEGER NOT NULL,
            start_amount    INTEGER,
            step_amount     INTEGER,
            weekly_amounts  TEXT NOT NULL,
            start_date      TEXT NOT NULL,
            status          TEXT NOT NULL,
            total_deposited INTEGER NOT NULL DEFAULT 0,
            linked_account_ref TEXT,
            version         INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS deposits (
            challenge_id TEXT NOT NULL REFERENCES challenges(id) ON DELETE CASCADE,
            week         INTEGER NOT NULL,
            date         TEXT NOT NULL,
            status       TEXT NOT NULL,
            amount       INTEGER NOT NULL,
            PRIMARY KEY (challenge_id, week)
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: track row timestamps and index by status for listings.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE challenges ADD COLUMN updated_at TEXT NOT NULL DEFAULT '';
         CREATE INDEX IF NOT EXISTS idx_challenges_status ON challenges(status);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
