//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get::<_, i32>(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

/// Apply a list of statements atomically.
fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    for stmt in statements {
        if let Err(e) = conn.execute_batch(stmt) {
            conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute_batch("COMMIT") {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Work entries, timestamps in unix ms
            "CREATE TABLE IF NOT EXISTS entries (
                local_id TEXT PRIMARY KEY,
                remote_id TEXT UNIQUE,
                user_id TEXT NOT NULL,
                technician_name TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                clock_in INTEGER,
                clock_out INTEGER,
                lunch_start INTEGER,
                lunch_end INTEGER,
                drive_start INTEGER,
                drive_end INTEGER,
                is_synced INTEGER NOT NULL DEFAULT 0,
                needs_sync INTEGER NOT NULL DEFAULT 0,
                pending_deletion INTEGER NOT NULL DEFAULT 0,
                last_modified_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_entries_user ON entries(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_entries_pending ON entries(needs_sync, pending_deletion)",
            "CREATE INDEX IF NOT EXISTS idx_entries_clock_in ON entries(clock_in)",
            "CREATE INDEX IF NOT EXISTS idx_entries_drive_start ON entries(drive_start)",
            // Record migration version
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: remember pushes the remote store refused
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "ALTER TABLE entries ADD COLUMN rejection_kind TEXT",
            "ALTER TABLE entries ADD COLUMN rejection_message TEXT",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_adds_rejection_columns() {
        let conn = setup();
        run(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('entries')
                 WHERE name IN ('rejection_kind', 'rejection_message')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(count, 2);
    }
}
