//! Sync engine: deletion, push, pull, reconciliation and retention passes.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::{RemoteError, SyncError};
use super::in_flight::InFlightSet;
use super::reconcile::{reconcile, ReconcileCounts};
use super::remote::{HttpRemoteStore, RemoteStore};
use super::retention::expired_entries;
use super::wire::{EntryPayload, RemoteEntry};
use crate::config::SyncSettings;
use crate::db::EntryRepository;
use crate::models::{EntryId, RejectionKind, SyncRejection, WorkEntry};
use crate::services::EntryService;

/// What happened to one entry in a push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// First push; the remote store assigned this id
    Created(String),
    Updated(String),
    /// Nothing to push, or another task is pushing the entry
    Skipped,
    /// Retryable failure; the entry stays pending
    Failed(RemoteError),
    /// Refused by the remote store; not retried until edited or deleted
    Rejected(SyncRejection),
}

/// Counters of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Tombstones confirmed remotely and purged
    pub deleted: usize,
    pub created: usize,
    pub updated: usize,
    /// Pushes or deletes that failed and will be retried
    pub failed: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub pulled: usize,
    pub inserted: usize,
    pub overwritten: usize,
    pub linked: usize,
    /// Entries removed by the retention policy
    pub dropped: usize,
    pub still_pending: usize,
}

impl SyncReport {
    pub const fn pushed(&self) -> usize {
        self.created + self.updated
    }

    /// Advisory line for entries that did not make it to the remote store.
    pub fn pending_advisory(&self) -> Option<String> {
        match self.still_pending {
            0 => None,
            1 => Some("1 entry pending sync".to_string()),
            count => Some(format!("{count} entries pending sync")),
        }
    }

    fn record_push(&mut self, outcome: &PushOutcome) {
        match outcome {
            PushOutcome::Created(_) => self.created += 1,
            PushOutcome::Updated(_) => self.updated += 1,
            PushOutcome::Skipped => self.skipped += 1,
            PushOutcome::Failed(_) => self.failed += 1,
            PushOutcome::Rejected(_) => self.rejected += 1,
        }
    }

    fn record_reconcile(&mut self, counts: ReconcileCounts) {
        self.pulled = counts.pulled;
        self.inserted = counts.inserted;
        self.overwritten = counts.overwritten;
        self.linked = counts.linked;
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pushed {} ({} new), deleted {}, pulled {}, merged {} new / {} updated",
            self.pushed(),
            self.created,
            self.deleted,
            self.pulled,
            self.inserted,
            self.overwritten
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.rejected > 0 {
            write!(f, ", {} rejected", self.rejected)?;
        }
        if self.dropped > 0 {
            write!(f, ", {} cleaned up", self.dropped)?;
        }
        Ok(())
    }
}

/// Moves entries between the local store and the remote store.
#[derive(Clone)]
pub struct SyncEngine {
    service: EntryService,
    remote: Arc<dyn RemoteStore>,
    in_flight: InFlightSet,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(service: EntryService, remote: Arc<dyn RemoteStore>, settings: SyncSettings) -> Self {
        Self {
            service,
            remote,
            in_flight: InFlightSet::new(),
            settings,
        }
    }

    /// Engine talking to the HTTP API configured in `settings`.
    pub fn http(service: EntryService, settings: SyncSettings) -> Result<Self, SyncError> {
        let remote = HttpRemoteStore::new(&settings.api_base_url, settings.request_timeout)
            .map_err(|error| SyncError::Config(error.to_string()))?;
        Ok(Self::new(service, Arc::new(remote), settings))
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub const fn service(&self) -> &EntryService {
        &self.service
    }

    /// Run one full cycle for `user_id`.
    ///
    /// Safe to call repeatedly and concurrently. Record-level failures are
    /// counted in the report; an auth failure or a failed pull ends the cycle.
    pub async fn run_sync_cycle(&self, user_id: &str, token: &str) -> Result<SyncReport, SyncError> {
        tracing::info!(user_id, "Starting sync cycle");
        let mut report = SyncReport::default();

        self.deletion_pass(user_id, token, &mut report).await?;
        self.push_pass(user_id, token, &mut report).await?;

        let pulled_at = self.service.now().await;
        let remote = self.pull(user_id, token).await?;
        let counts = self.merge(user_id, &remote, pulled_at).await?;
        report.record_reconcile(counts);

        report.dropped = self.apply_retention(user_id).await?;
        report.still_pending = self.service.pending_count(user_id).await?;

        tracing::info!(user_id, "Sync cycle finished: {report}");
        Ok(report)
    }

    /// Push one entry right after a local change.
    pub async fn push_now(&self, local_id: &EntryId, token: &str) -> Result<PushOutcome, SyncError> {
        self.push_entry(*local_id, token).await
    }

    async fn deletion_pass(
        &self,
        user_id: &str,
        token: &str,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let tombstones = self
            .service
            .pending_for(user_id)
            .await?
            .into_iter()
            // Only a refused delete flags a tombstone; deleting it again clears the flag
            .filter(|entry| entry.pending_deletion && entry.sync_rejection.is_none());

        for tombstone in tombstones {
            let Some(_guard) = self.in_flight.try_acquire(tombstone.local_id) else {
                tracing::debug!(entry_id = %tombstone.local_id, "Deletion already in flight");
                report.skipped += 1;
                continue;
            };

            let Some(remote_id) = tombstone.remote_id.clone() else {
                self.purge(&tombstone.local_id).await?;
                report.deleted += 1;
                continue;
            };

            match self.remote.delete(token, &remote_id).await {
                Ok(()) | Err(RemoteError::NotFound(_)) => {
                    self.purge(&tombstone.local_id).await?;
                    report.deleted += 1;
                }
                Err(RemoteError::Auth(message)) => return Err(SyncError::Auth(message)),
                Err(error) => {
                    tracing::warn!(entry_id = %tombstone.local_id, %remote_id, "Delete failed: {error}");
                    if let Some(rejection) = error.rejection() {
                        self.flag_rejection(&tombstone, rejection).await?;
                        report.rejected += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }
        Ok(())
    }

    async fn push_pass(
        &self,
        user_id: &str,
        token: &str,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let candidates = self
            .service
            .pending_for(user_id)
            .await?
            .into_iter()
            .filter(WorkEntry::is_push_candidate)
            .map(|entry| entry.local_id)
            .collect::<Vec<_>>();

        for (index, local_id) in candidates.into_iter().enumerate() {
            if index > 0 && !self.settings.push_delay.is_zero() {
                tokio::time::sleep(self.settings.push_delay).await;
            }
            let outcome = self.push_entry(local_id, token).await?;
            report.record_push(&outcome);
        }
        Ok(())
    }

    async fn push_entry(&self, local_id: EntryId, token: &str) -> Result<PushOutcome, SyncError> {
        let Some(_guard) = self.in_flight.try_acquire(local_id) else {
            tracing::debug!(entry_id = %local_id, "Push already in flight");
            return Ok(PushOutcome::Skipped);
        };

        // Re-read under the guard: a push that just finished may have settled it.
        let Some(snapshot) = self.service.get(&local_id).await? else {
            return Ok(PushOutcome::Skipped);
        };
        if !snapshot.is_push_candidate() {
            return Ok(PushOutcome::Skipped);
        }

        let payload = EntryPayload::from_entry(&snapshot);
        let result = if snapshot.remote_id.is_some() {
            self.remote.update(token, &payload).await
        } else {
            self.remote.create(token, &payload).await
        };

        match result {
            Ok(remote_entry) => self.commit_push(&snapshot, &remote_entry).await,
            Err(RemoteError::Auth(message)) => Err(SyncError::Auth(message)),
            Err(error) if error.is_retryable() => {
                tracing::warn!(entry_id = %local_id, "Push failed, will retry: {error}");
                Ok(PushOutcome::Failed(error))
            }
            Err(error) => {
                tracing::warn!(entry_id = %local_id, "Push refused: {error}");
                let rejection = error.rejection().unwrap_or_else(|| SyncRejection {
                    kind: RejectionKind::Validation,
                    message: error.to_string(),
                });
                self.flag_rejection(&snapshot, rejection.clone()).await?;
                Ok(PushOutcome::Rejected(rejection))
            }
        }
    }

    /// Record a successful push, unless the entry changed underneath it.
    async fn commit_push(
        &self,
        snapshot: &WorkEntry,
        remote_entry: &RemoteEntry,
    ) -> Result<PushOutcome, SyncError> {
        let outcome = self
            .service
            .with_db(|db| -> crate::Result<PushOutcome> {
                let repo = db.entries();
                let Some(mut current) = repo.get(&snapshot.local_id)? else {
                    tracing::warn!(
                        entry_id = %snapshot.local_id,
                        remote_id = %remote_entry.id,
                        "Entry vanished while its push was in flight"
                    );
                    return Ok(PushOutcome::Skipped);
                };

                let known_id = current.remote_id.clone();
                let outcome = match known_id.as_deref() {
                    None => PushOutcome::Created(remote_entry.id.clone()),
                    Some(known) if known == remote_entry.id => {
                        PushOutcome::Updated(remote_entry.id.clone())
                    }
                    Some(known) => {
                        tracing::warn!(
                            entry_id = %current.local_id,
                            remote_id = known,
                            stored_as = %remote_entry.id,
                            "Remote entry no longer exists; server stored the update as a new entry"
                        );
                        let rejection = SyncRejection {
                            kind: RejectionKind::Validation,
                            message: format!(
                                "remote entry {known} no longer exists (server stored it as {})",
                                remote_entry.id
                            ),
                        };
                        current.sync_rejection = Some(rejection.clone());
                        repo.save(&current)?;
                        return Ok(PushOutcome::Rejected(rejection));
                    }
                };

                if current.last_modified_at == snapshot.last_modified_at {
                    current.mark_synced(&remote_entry.id);
                } else {
                    current
                        .remote_id
                        .get_or_insert_with(|| remote_entry.id.clone());
                    current.is_synced = true;
                    tracing::debug!(
                        entry_id = %current.local_id,
                        "Entry changed during push; keeping it pending"
                    );
                }
                repo.save(&current)?;
                Ok(outcome)
            })
            .await?;

        if let PushOutcome::Created(remote_id) = &outcome {
            tracing::info!(entry_id = %snapshot.local_id, %remote_id, "Created remote entry");
        }
        Ok(outcome)
    }

    /// Store a refusal, unless the entry was edited since the refused push.
    async fn flag_rejection(
        &self,
        snapshot: &WorkEntry,
        rejection: SyncRejection,
    ) -> Result<(), SyncError> {
        self.service
            .with_db(|db| -> crate::Result<()> {
                let repo = db.entries();
                if let Some(mut current) = repo.get(&snapshot.local_id)? {
                    if current.last_modified_at == snapshot.last_modified_at {
                        current.sync_rejection = Some(rejection);
                        repo.save(&current)?;
                    }
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn purge(&self, local_id: &EntryId) -> Result<(), SyncError> {
        self.service
            .with_db(|db| db.entries().purge(local_id))
            .await?;
        tracing::debug!(entry_id = %local_id, "Purged entry");
        Ok(())
    }

    async fn pull(&self, user_id: &str, token: &str) -> Result<Vec<RemoteEntry>, SyncError> {
        let entries = self.remote.list(token).await.map_err(|error| match error {
            RemoteError::Auth(message) => SyncError::Auth(message),
            other => SyncError::Pull(other),
        })?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.user_id == user_id)
            .collect())
    }

    /// Reconcile the pull into the store in one locked step.
    async fn merge(
        &self,
        user_id: &str,
        remote: &[RemoteEntry],
        pulled_at: DateTime<Utc>,
    ) -> Result<ReconcileCounts, SyncError> {
        let in_flight = self.in_flight.clone();
        let counts = self
            .service
            .with_db(|db| -> crate::Result<ReconcileCounts> {
                let repo = db.entries();
                let local = repo.list_for_user(user_id)?;
                let outcome = reconcile(&local, remote, pulled_at);

                for entry in &outcome.upserts {
                    if in_flight.contains(&entry.local_id) {
                        tracing::debug!(entry_id = %entry.local_id, "Skipping merge of entry in flight");
                        continue;
                    }
                    repo.save(entry)?;
                }
                Ok(outcome.counts)
            })
            .await?;
        Ok(counts)
    }

    async fn apply_retention(&self, user_id: &str) -> Result<usize, SyncError> {
        let policy = self.settings.retention;
        let in_flight = self.in_flight.clone();
        let dropped = self
            .service
            .with_db(|db| -> crate::Result<usize> {
                let repo = db.entries();
                let entries = repo.list_for_user(user_id)?;
                let now = db.clock().now();
                let mut dropped = 0;
                for id in expired_entries(&entries, user_id, policy, now) {
                    if !in_flight.contains(&id) && repo.purge(&id)? {
                        dropped += 1;
                    }
                }
                Ok(dropped)
            })
            .await?;
        if dropped > 0 {
            tracing::debug!(user_id, dropped, "Dropped entries outside the retention window");
        }
        Ok(dropped)
    }
}
