//! In-memory `RemoteStore` for engine tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::error::RemoteError;
use super::remote::{RemoteResult, RemoteStore};
use super::wire::{EntryPayload, RemoteEntry};

pub const VALID_TOKEN: &str = "valid-token";

#[derive(Default)]
pub struct FakeRemote {
    pub entries: Mutex<Vec<RemoteEntry>>,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub next_id: AtomicUsize,
    /// Every call fails with a network error
    pub offline: AtomicBool,
    /// Next push fails with this error
    pub push_error: Mutex<Option<RemoteError>>,
    /// Next delete fails with this error
    pub delete_error: Mutex<Option<RemoteError>>,
    /// Pushes of this customer are refused with 400
    pub refuse_customer: Mutex<Option<String>>,
    pub call_delay: Duration,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(call_delay: Duration) -> Self {
        Self {
            call_delay,
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_next_push(&self, error: RemoteError) {
        *self.push_error.lock().unwrap() = Some(error);
    }

    pub fn fail_next_delete(&self, error: RemoteError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub fn refuse_customer(&self, customer: &str) {
        *self.refuse_customer.lock().unwrap() = Some(customer.to_string());
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<RemoteEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Put an entry on the server as if another device had pushed it.
    pub fn seed(&self, entry: RemoteEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    async fn enter(&self, token: &str) -> RemoteResult<()> {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".to_string()));
        }
        if token != VALID_TOKEN {
            return Err(RemoteError::Auth("Invalid or expired session (401)".to_string()));
        }
        Ok(())
    }

    fn check_push(&self, payload: &EntryPayload) -> RemoteResult<()> {
        if let Some(error) = self.push_error.lock().unwrap().take() {
            return Err(error);
        }
        if payload.customer_name.trim().is_empty() {
            return Err(RemoteError::Validation(
                "customerName is required (400)".to_string(),
            ));
        }
        let refused = self.refuse_customer.lock().unwrap().clone();
        if refused.as_deref() == Some(payload.customer_name.as_str()) {
            return Err(RemoteError::Validation("Missing required fields (400)".to_string()));
        }
        Ok(())
    }

    fn store_new(&self, payload: &EntryPayload) -> RemoteEntry {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = to_remote(format!("R{id}"), payload);
        self.entries.lock().unwrap().push(entry.clone());
        entry
    }
}

fn to_remote(id: String, payload: &EntryPayload) -> RemoteEntry {
    RemoteEntry {
        id,
        user_id: payload.user_id.clone(),
        technician_name: payload.technician_name.clone(),
        customer_name: payload.customer_name.clone(),
        clock_in_time: payload.clock_in_time,
        clock_out_time: payload.clock_out_time,
        lunch_start_time: payload.lunch_start_time,
        lunch_end_time: payload.lunch_end_time,
        drive_start_time: payload.drive_start_time,
        drive_end_time: payload.drive_end_time,
        updated_at: None,
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn create(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(token).await?;
        self.check_push(payload)?;
        Ok(self.store_new(payload))
    }

    async fn update(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(token).await?;
        self.check_push(payload)?;

        let id = payload.id.clone().unwrap_or_default();
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.iter_mut().find(|entry| entry.id == id) {
            *existing = to_remote(id, payload);
            return Ok(existing.clone());
        }
        drop(entries);
        // Unknown ids are stored as new entries
        Ok(self.store_new(payload))
    }

    async fn list(&self, token: &str) -> RemoteResult<Vec<RemoteEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(token).await?;
        let mut entries = self.stored();
        entries.reverse();
        Ok(entries)
    }

    async fn delete(&self, token: &str, remote_id: &str) -> RemoteResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(token).await?;
        if let Some(error) = self.delete_error.lock().unwrap().take() {
            return Err(error);
        }

        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|entry| entry.id != remote_id);
        if entries.len() == before {
            return Err(RemoteError::NotFound("Time entry not found (404)".to_string()));
        }
        Ok(())
    }
}
