//! Remote time entry store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::error::RemoteError;
use super::wire::{ApiErrorBody, EntryPayload, RemoteEntry};
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Authoritative store shared by every device of a technician.
///
/// Every call carries the caller's bearer token.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a new remote entry; the response carries its assigned id.
    async fn create(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry>;

    /// Update the entry identified by `payload.id`.
    async fn update(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry>;

    /// Every entry visible to the token, newest first.
    async fn list(&self, token: &str) -> RemoteResult<Vec<RemoteEntry>>;

    async fn delete(&self, token: &str, remote_id: &str) -> RemoteResult<()>;
}

/// `RemoteStore` over the JSON HTTP API.
#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::Network(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { base_url, client })
    }

    fn entries_url(&self) -> String {
        format!("{}/time-entries", self.base_url)
    }

    /// URL of one entry. Ids are used as a single path segment, so only
    /// unreserved URL characters are accepted.
    fn entry_url(&self, remote_id: &str) -> RemoteResult<String> {
        let remote_id = remote_id.trim();
        let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~');
        if remote_id.is_empty()
            || remote_id == "."
            || remote_id == ".."
            || !remote_id.chars().all(unreserved)
        {
            return Err(RemoteError::Validation(format!(
                "invalid remote entry id {remote_id:?}"
            )));
        }
        Ok(format!("{}/{}", self.entries_url(), remote_id))
    }

    async fn post(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry> {
        let response = self
            .client
            .post(self.entries_url())
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<RemoteEntry>().await?)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry> {
        if payload.id.is_some() {
            let payload = EntryPayload {
                id: None,
                ..payload.clone()
            };
            return self.post(token, &payload).await;
        }
        self.post(token, payload).await
    }

    async fn update(&self, token: &str, payload: &EntryPayload) -> RemoteResult<RemoteEntry> {
        if payload.id.is_none() {
            return Err(RemoteError::Validation(
                "update requires a remote id".to_string(),
            ));
        }
        self.post(token, payload).await
    }

    async fn list(&self, token: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let response = self
            .client
            .get(self.entries_url())
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<Vec<RemoteEntry>>().await?)
    }

    async fn delete(&self, token: &str, remote_id: &str) -> RemoteResult<()> {
        let url = self.entry_url(remote_id)?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_status(
        status.as_u16(),
        parse_api_error(status, &body),
    ))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        let detail = payload.details.or(payload.message);
        match (payload.error, detail) {
            (Some(error), Some(detail)) => {
                return format!("{}: {} ({})", error.trim(), detail.trim(), status.as_u16());
            }
            (Some(message), None) | (None, Some(message)) => {
                return format!("{} ({})", message.trim(), status.as_u16());
            }
            (None, None) => {}
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Validation("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Validation(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
