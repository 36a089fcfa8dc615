//! Shared entry service wrapper used by every client surface and the sync engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::clock::{ClockAction, ClockError, ClockMachine, ClockState, Transition};
use crate::db::{Database, EntryRepository};
use crate::models::{EntryId, WorkEntry};
use crate::util::{now_millis, Clock};
use crate::{Error, Result};

/// Thread-safe owner of the local store.
///
/// The lock is only ever held for synchronous store work, never across a
/// remote call.
#[derive(Clone)]
pub struct EntryService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl EntryService {
    /// Open a service over the database file at `db_path`.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        tracing::debug!("Opened entry store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    /// Open an in-memory service driven by `clock`.
    pub fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory_with_clock(
            clock,
        )?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        }
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run synchronous store work under the lock.
    pub async fn with_db<T>(&self, work: impl FnOnce(&Database) -> T) -> T {
        let db = self.db.lock().await;
        work(&db)
    }

    /// Current time of the store's clock.
    pub async fn now(&self) -> DateTime<Utc> {
        self.with_db(|db| now_millis(db.clock())).await
    }

    /// Apply a clock action for a technician.
    pub async fn apply(
        &self,
        user_id: &str,
        technician_name: &str,
        action: ClockAction,
    ) -> std::result::Result<Transition, ClockError> {
        self.with_db(|db| {
            let mut machine = ClockMachine::restore(db, user_id, technician_name)?;
            machine.apply(db, action)
        })
        .await
    }

    /// Current clock state of `user_id`.
    pub async fn clock_state(&self, user_id: &str) -> Result<ClockState> {
        self.with_db(|db| Ok(ClockMachine::restore(db, user_id, "")?.state()))
            .await
    }

    /// Soft-delete an entry of `user_id`.
    pub async fn delete_entry(
        &self,
        user_id: &str,
        id: &EntryId,
    ) -> std::result::Result<WorkEntry, ClockError> {
        self.with_db(|db| {
            let owned = db
                .entries()
                .get(id)?
                .is_some_and(|entry| entry.user_id == user_id);
            if !owned {
                return Err(ClockError::EntryNotFound(*id));
            }
            let mut machine = ClockMachine::restore(db, user_id, "")?;
            machine.delete_entry(db, id)
        })
        .await
    }

    pub async fn get(&self, id: &EntryId) -> Result<Option<WorkEntry>> {
        self.with_db(|db| db.entries().get(id)).await
    }

    /// The user's open session.
    pub async fn active_entry(&self, user_id: &str) -> Result<Option<WorkEntry>> {
        self.with_db(|db| db.entries().active_for(user_id)).await
    }

    /// Every entry of `user_id`, tombstones included.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<WorkEntry>> {
        self.with_db(|db| db.entries().list_for_user(user_id)).await
    }

    /// Non-deleted entries of `user_id` anchored in `[start, end)`.
    pub async fn list_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkEntry>> {
        let entries = self
            .with_db(|db| db.entries().within_window(start, end))
            .await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.user_id == user_id)
            .collect())
    }

    /// Entries of `user_id` waiting for the remote store.
    pub async fn pending_for(&self, user_id: &str) -> Result<Vec<WorkEntry>> {
        let entries = self.with_db(|db| db.entries().pending()).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.user_id == user_id)
            .collect())
    }

    pub async fn pending_count(&self, user_id: &str) -> Result<usize> {
        self.with_db(|db| db.entries().pending_count(user_id)).await
    }

    /// Resolve a full local id or a unique prefix of one.
    pub async fn resolve_id(&self, raw: &str) -> Result<EntryId> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<EntryId>() {
            return Ok(id);
        }

        let matches = self
            .with_db(|db| db.entries().find_by_prefix(raw, 2))
            .await?;
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(Error::NotFound(raw.to_string())),
            _ => Err(Error::InvalidInput(format!(
                "entry id prefix '{raw}' is ambiguous"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ManualClock;
    use chrono::TimeZone;

    fn service() -> (EntryService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap(),
        ));
        let service = EntryService::open_in_memory_with_clock(clock.clone()).unwrap();
        (service, clock)
    }

    #[tokio::test]
    async fn apply_and_query_roundtrip() {
        let (service, _) = service();

        let transition = service
            .apply(
                "u1",
                "Sam Tech",
                ClockAction::ClockIn {
                    customer: "Acme".to_string(),
                },
            )
            .await
            .unwrap();
        let id = transition.entry.local_id;

        assert_eq!(
            service.clock_state("u1").await.unwrap(),
            ClockState::ClockedIn(id)
        );
        assert_eq!(service.pending_count("u1").await.unwrap(), 1);
        assert_eq!(service.pending_for("u2").await.unwrap().len(), 0);
        assert_eq!(
            service.active_entry("u1").await.unwrap().map(|e| e.local_id),
            Some(id)
        );
    }

    #[tokio::test]
    async fn delete_is_limited_to_owner() {
        let (service, _) = service();
        let transition = service
            .apply("u1", "Sam Tech", ClockAction::StartLunch)
            .await
            .unwrap();
        let id = transition.entry.local_id;

        assert!(matches!(
            service.delete_entry("u2", &id).await.unwrap_err(),
            ClockError::EntryNotFound(_)
        ));

        let deleted = service.delete_entry("u1", &id).await.unwrap();
        assert!(deleted.pending_deletion);
        assert_eq!(service.clock_state("u1").await.unwrap(), ClockState::Idle);
    }

    #[tokio::test]
    async fn resolve_id_accepts_prefix() {
        let (service, _) = service();
        let transition = service
            .apply("u1", "Sam Tech", ClockAction::StartLunch)
            .await
            .unwrap();
        let id = transition.entry.local_id;
        let full = id.to_string();

        assert_eq!(service.resolve_id(&full).await.unwrap(), id);
        assert_eq!(service.resolve_id(&full[..13]).await.unwrap(), id);
        assert!(matches!(
            service.resolve_id("ffffffff").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn open_path_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("entries.db");

        {
            let service = EntryService::open_path(&path).unwrap();
            service
                .apply("u1", "Sam Tech", ClockAction::StartLunch)
                .await
                .unwrap();
        }

        let reopened = EntryService::open_path(&path).unwrap();
        assert_eq!(reopened.list_for_user("u1").await.unwrap().len(), 1);
        assert_eq!(reopened.db_path(), Some(path.as_path()));
    }
}
