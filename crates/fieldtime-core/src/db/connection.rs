//! Database connection management

use crate::error::Result;
use crate::util::{Clock, SystemClock};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

use super::migrations;
use super::repository::SqliteEntryRepository;

/// Database wrapper for the on-device `SQLite` store
pub struct Database {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Open a database whose mutation timestamps come from `clock`
    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let database = Self { conn, clock };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Open an in-memory database driven by `clock`
    pub fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn, clock };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for a single-writer device store
    fn configure(&self) -> Result<()> {
        // WAL is not available for in-memory databases; ignore the result there
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .ok();
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Clock used to stamp local mutations
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Entry repository bound to this connection and clock
    pub fn entries(&self) -> SqliteEntryRepository<'_> {
        SqliteEntryRepository::new(&self.conn, self.clock.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EntryRepository;
    use crate::models::WorkEntry;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.entries().pending().unwrap().is_empty());
    }

    #[test]
    fn test_open_file_persists_entries() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("fieldtime.db");

        let mut entry = WorkEntry::new("u1", "Sam Tech", "Acme", chrono::Utc::now());
        entry.clock_in = Some(chrono::Utc::now());
        {
            let db = Database::open(&db_path).unwrap();
            db.entries().append(&entry).unwrap();
        }

        let reopened = Database::open(&db_path).unwrap();
        let fetched = reopened.entries().get(&entry.local_id).unwrap().unwrap();
        assert_eq!(fetched.customer_name, "Acme");
    }
}
