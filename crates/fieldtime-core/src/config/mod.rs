//! Client configuration.
//!
//! `ClientConfig` is the serialized form shared by every client surface. The
//! sync engine consumes the validated, typed `SyncSettings` derived from it.

use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PUSH_DELAY_MS: u64 = 100;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Upper bound for the pause between two pushes.
const MAX_PUSH_DELAY_MS: u64 = 10_000;

/// Which local entries survive the post-pull cleanup.
///
/// Entries with unsynced work or an open session are kept whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Entries anchored on the current local calendar day
    #[default]
    Today,
    /// The current day plus the given number of preceding days
    TrailingDays(u32),
    /// Never drop anything
    KeepAll,
}

impl RetentionPolicy {
    /// `[start, end)` window of kept anchors, or `None` when everything is kept.
    ///
    /// Day boundaries follow the local time zone of the device.
    pub fn window(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let days_back = match self {
            Self::KeepAll => return None,
            Self::Today => 0,
            Self::TrailingDays(days) => days,
        };

        let today = now.with_timezone(&Local).date_naive();
        let first_day = today.checked_sub_days(Days::new(u64::from(days_back)))?;
        let day_after = today.checked_add_days(Days::new(1))?;

        let start = local_midnight(first_day)?;
        let end = local_midnight(day_after)?;
        Some((start, end))
    }
}

fn local_midnight(day: chrono::NaiveDate) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .earliest()
        .map(|value| value.with_timezone(&Utc))
}

/// Serialized client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the time entry API, e.g. `https://example.com/api`
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Pause between two pushes of one cycle
    pub push_delay_ms: u64,
    /// Period of `sync --watch`
    pub sync_interval_secs: u64,
    pub retention: RetentionPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            push_delay_ms: DEFAULT_PUSH_DELAY_MS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            retention: RetentionPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON config document.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values and return the normalized API base URL.
    pub fn validate(&self) -> Result<String> {
        let base = normalize_text_option(Some(self.api_base_url.clone()))
            .ok_or_else(|| Error::Config("api_base_url must not be empty".to_string()))?;
        if !is_http_url(&base) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Config(
                "sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.push_delay_ms > MAX_PUSH_DELAY_MS {
            return Err(Error::Config(format!(
                "push_delay_ms must be at most {MAX_PUSH_DELAY_MS}"
            )));
        }
        Ok(base.trim_end_matches('/').to_string())
    }

    /// Typed settings for the sync engine.
    pub fn sync_settings(&self) -> Result<SyncSettings> {
        let api_base_url = self.validate()?;
        Ok(SyncSettings {
            api_base_url,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            push_delay: Duration::from_millis(self.push_delay_ms),
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            retention: self.retention,
        })
    }
}

/// Validated runtime settings of the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub push_delay: Duration,
    pub sync_interval: Duration,
    pub retention: RetentionPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            push_delay: Duration::from_millis(DEFAULT_PUSH_DELAY_MS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            retention: RetentionPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        let settings = ClientConfig::default().sync_settings().unwrap();
        assert_eq!(settings, SyncSettings::default());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config =
            ClientConfig::from_json(r#"{"api_base_url": "https://time.example.com/api/"}"#)
                .unwrap();
        assert_eq!(config.push_delay_ms, DEFAULT_PUSH_DELAY_MS);
        assert_eq!(
            config.sync_settings().unwrap().api_base_url,
            "https://time.example.com/api"
        );
    }

    #[test]
    fn retention_policy_json_forms() {
        let config = ClientConfig::from_json(r#"{"retention": {"trailing_days": 7}}"#).unwrap();
        assert_eq!(config.retention, RetentionPolicy::TrailingDays(7));

        let config = ClientConfig::from_json(r#"{"retention": "keep_all"}"#).unwrap();
        assert_eq!(config.retention, RetentionPolicy::KeepAll);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(ClientConfig::from_json(r#"{"api_base_url": "time.example.com"}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"request_timeout_secs": 0}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"push_delay_ms": 60000}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"unexpected": true}"#).is_err());
    }

    #[test]
    fn today_window_spans_one_local_day() {
        let now = Utc::now();
        let (start, end) = RetentionPolicy::Today.window(now).unwrap();
        assert!(start <= now && now < end);
        assert!(end - start >= chrono::Duration::hours(23));
        assert!(end - start <= chrono::Duration::hours(25));
    }

    #[test]
    fn trailing_days_window_reaches_back() {
        let now = Utc::now();
        let (start, _) = RetentionPolicy::TrailingDays(3).window(now).unwrap();
        assert!(now - start >= chrono::Duration::days(3));
        assert!(RetentionPolicy::KeepAll.window(now).is_none());
    }
}
