//! Work entry repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{EntryId, SyncRejection, WorkEntry};
use crate::util::{from_unix_ms, now_millis, Clock};

const ENTRY_COLUMNS: &str = "local_id, remote_id, user_id, technician_name, customer_name,
    clock_in, clock_out, lunch_start, lunch_end, drive_start, drive_end,
    is_synced, needs_sync, pending_deletion, last_modified_at,
    rejection_kind, rejection_message";

const ACTIVE_PREDICATE: &str = "pending_deletion = 0 AND clock_out IS NULL AND (
    clock_in IS NOT NULL
    OR (drive_start IS NOT NULL AND drive_end IS NULL)
    OR (lunch_start IS NOT NULL AND lunch_end IS NULL))";

/// Trait for local entry storage operations
///
/// All operations are synchronous; callers serialize access through a single
/// owner (see `services::EntryService`).
pub trait EntryRepository {
    /// Insert a new entry. Fails if it would open a second session for the user.
    fn append(&self, entry: &WorkEntry) -> Result<()>;

    /// Get an entry by local ID, tombstones included
    fn get(&self, id: &EntryId) -> Result<Option<WorkEntry>>;

    /// Apply a local edit. Stamps `last_modified_at`, marks the entry pending
    /// and clears any earlier push rejection.
    fn update<F>(&self, id: &EntryId, mutator: F) -> Result<WorkEntry>
    where
        F: FnOnce(&mut WorkEntry);

    /// Tombstone an entry so the deletion can be propagated
    fn mark_deleted(&self, id: &EntryId) -> Result<WorkEntry>;

    /// Hard delete. Returns whether a row was removed.
    fn purge(&self, id: &EntryId) -> Result<bool>;

    /// The user's open session, if any
    fn active_for(&self, user_id: &str) -> Result<Option<WorkEntry>>;

    /// Entries with `needs_sync` or `pending_deletion`, oldest change first
    fn pending(&self) -> Result<Vec<WorkEntry>>;

    /// Non-deleted entries anchored in `[start, end)`, oldest first
    fn within_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WorkEntry>>;

    /// Every entry owned by `user_id`, tombstones included
    fn list_for_user(&self, user_id: &str) -> Result<Vec<WorkEntry>>;

    /// Local IDs starting with `prefix`
    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<EntryId>>;

    /// Insert or overwrite an entry verbatim, without stamping.
    ///
    /// Used to commit push results and reconciliation output.
    fn save(&self, entry: &WorkEntry) -> Result<()>;

    /// Number of entries of `user_id` still waiting for the remote store
    fn pending_count(&self, user_id: &str) -> Result<usize>;
}

/// `SQLite` implementation of `EntryRepository`
pub struct SqliteEntryRepository<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
}

impl<'a> SqliteEntryRepository<'a> {
    /// Create a new repository with the given connection and clock
    pub const fn new(conn: &'a Connection, clock: &'a dyn Clock) -> Self {
        Self { conn, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        now_millis(self.clock)
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkEntry> {
        let local_id: String = row.get(0)?;
        let local_id = local_id.parse().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(error))
        })?;
        let last_modified_at: i64 = row.get(14)?;
        let rejection_kind: Option<String> = row.get(15)?;
        let rejection_message: Option<String> = row.get(16)?;

        Ok(WorkEntry {
            local_id,
            remote_id: row.get(1)?,
            user_id: row.get(2)?,
            technician_name: row.get(3)?,
            customer_name: row.get(4)?,
            clock_in: from_unix_ms(row.get(5)?),
            clock_out: from_unix_ms(row.get(6)?),
            lunch_start: from_unix_ms(row.get(7)?),
            lunch_end: from_unix_ms(row.get(8)?),
            drive_start: from_unix_ms(row.get(9)?),
            drive_end: from_unix_ms(row.get(10)?),
            is_synced: row.get::<_, i32>(11)? != 0,
            needs_sync: row.get::<_, i32>(12)? != 0,
            pending_deletion: row.get::<_, i32>(13)? != 0,
            last_modified_at: DateTime::from_timestamp_millis(last_modified_at)
                .unwrap_or_default(),
            sync_rejection: rejection_kind
                .and_then(|kind| kind.parse().ok())
                .map(|kind| SyncRejection {
                    kind,
                    message: rejection_message.unwrap_or_default(),
                }),
        })
    }

    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<WorkEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params, Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Refuse to open a second session for the same user
    fn ensure_single_active(&self, entry: &WorkEntry) -> Result<()> {
        if !entry.is_active() || entry.pending_deletion {
            return Ok(());
        }
        if let Some(active) = self.active_for(&entry.user_id)? {
            if active.local_id != entry.local_id {
                return Err(Error::ActiveEntryExists {
                    user_id: entry.user_id.clone(),
                    active_id: active.local_id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn write(&self, entry: &WorkEntry, upsert: bool) -> Result<()> {
        let verb = if upsert { "INSERT OR REPLACE" } else { "INSERT" };
        let sql = format!(
            "{verb} INTO entries ({ENTRY_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let millis = |value: Option<DateTime<Utc>>| value.map(|ts| ts.timestamp_millis());

        self.conn.execute(
            &sql,
            params![
                entry.local_id.as_str(),
                entry.remote_id,
                entry.user_id,
                entry.technician_name,
                entry.customer_name,
                millis(entry.clock_in),
                millis(entry.clock_out),
                millis(entry.lunch_start),
                millis(entry.lunch_end),
                millis(entry.drive_start),
                millis(entry.drive_end),
                i32::from(entry.is_synced),
                i32::from(entry.needs_sync),
                i32::from(entry.pending_deletion),
                entry.last_modified_at.timestamp_millis(),
                entry.sync_rejection.as_ref().map(|r| r.kind.as_str()),
                entry.sync_rejection.as_ref().map(|r| r.message.as_str()),
            ],
        )?;
        Ok(())
    }

    fn require(&self, id: &EntryId) -> Result<WorkEntry> {
        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn append(&self, entry: &WorkEntry) -> Result<()> {
        self.ensure_single_active(entry)?;
        self.write(entry, false)
    }

    fn get(&self, id: &EntryId) -> Result<Option<WorkEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE local_id = ?"),
                params![id.as_str()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn update<F>(&self, id: &EntryId, mutator: F) -> Result<WorkEntry>
    where
        F: FnOnce(&mut WorkEntry),
    {
        let mut entry = self.require(id)?;
        if entry.pending_deletion {
            return Err(Error::InvalidInput(format!("entry {id} is being deleted")));
        }

        mutator(&mut entry);
        entry.local_id = *id;
        entry.needs_sync = true;
        entry.sync_rejection = None;
        entry.last_modified_at = self.now();

        self.ensure_single_active(&entry)?;
        self.write(&entry, true)?;
        Ok(entry)
    }

    fn mark_deleted(&self, id: &EntryId) -> Result<WorkEntry> {
        let mut entry = self.require(id)?;
        entry.pending_deletion = true;
        // Deleting is the user's answer to whatever the server refused
        entry.sync_rejection = None;
        entry.last_modified_at = self.now();
        self.write(&entry, true)?;
        Ok(entry)
    }

    fn purge(&self, id: &EntryId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM entries WHERE local_id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn active_for(&self, user_id: &str) -> Result<Option<WorkEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries
                     WHERE user_id = ? AND {ACTIVE_PREDICATE}
                     ORDER BY last_modified_at DESC
                     LIMIT 1"
                ),
                params![user_id],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn pending(&self) -> Result<Vec<WorkEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE needs_sync = 1 OR pending_deletion = 1
                 ORDER BY last_modified_at ASC, local_id ASC"
            ),
            [],
        )
    }

    fn within_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<WorkEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE pending_deletion = 0
                   AND COALESCE(clock_in, drive_start, lunch_start) >= ?
                   AND COALESCE(clock_in, drive_start, lunch_start) < ?
                 ORDER BY COALESCE(clock_in, drive_start, lunch_start) ASC"
            ),
            params![start.timestamp_millis(), end.timestamp_millis()],
        )
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<WorkEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE user_id = ?
                 ORDER BY COALESCE(clock_in, drive_start, lunch_start, last_modified_at) ASC"
            ),
            params![user_id],
        )
    }

    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<EntryId>> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT local_id FROM entries
             WHERE substr(local_id, 1, length(?1)) = ?1
             ORDER BY local_id
             LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![prefix, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids.into_iter().filter_map(|id| id.parse().ok()).collect())
    }

    fn save(&self, entry: &WorkEntry) -> Result<()> {
        self.write(entry, true)
    }

    fn pending_count(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries
             WHERE user_id = ? AND (needs_sync = 1 OR pending_deletion = 1)",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
