//! JSON shapes exchanged with the time entry API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::WorkEntry;

/// Request body of `POST /time-entries`. An `id` turns the create into an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub technician_name: String,
    pub customer_name: String,
    #[serde(with = "iso_millis", skip_serializing_if = "Option::is_none")]
    pub clock_in_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis", skip_serializing_if = "Option::is_none")]
    pub clock_out_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis", skip_serializing_if = "Option::is_none")]
    pub lunch_start_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis", skip_serializing_if = "Option::is_none")]
    pub lunch_end_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis", skip_serializing_if = "Option::is_none")]
    pub drive_start_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis", skip_serializing_if = "Option::is_none")]
    pub drive_end_time: Option<DateTime<Utc>>,
}

impl EntryPayload {
    /// Body for pushing `entry`; carries its remote id when it has one.
    pub fn from_entry(entry: &WorkEntry) -> Self {
        Self {
            id: entry.remote_id.clone(),
            user_id: entry.user_id.clone(),
            technician_name: entry.technician_name.clone(),
            customer_name: entry.customer_name.clone(),
            clock_in_time: entry.clock_in,
            clock_out_time: entry.clock_out,
            lunch_start_time: entry.lunch_start,
            lunch_end_time: entry.lunch_end,
            drive_start_time: entry.drive_start,
            drive_end_time: entry.drive_end,
        }
    }
}

/// A time entry as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(default)]
    pub technician_name: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub clock_in_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clock_out_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lunch_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lunch_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub drive_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub drive_end_time: Option<DateTime<Utc>>,
    /// Last modification on the server, when the service reports it
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Materialize as a fresh, synced local entry.
    pub fn to_local(&self, last_modified_at: DateTime<Utc>) -> WorkEntry {
        let mut entry = WorkEntry::new(
            &self.user_id,
            &self.technician_name,
            &self.customer_name,
            last_modified_at,
        );
        self.apply_to(&mut entry, last_modified_at);
        entry
    }

    /// Same customer, technician and timestamps as `entry`.
    pub fn matches_content(&self, entry: &WorkEntry) -> bool {
        self.customer_name == entry.customer_name
            && self.technician_name == entry.technician_name
            && self.clock_in_time == entry.clock_in
            && self.clock_out_time == entry.clock_out
            && self.lunch_start_time == entry.lunch_start
            && self.lunch_end_time == entry.lunch_end
            && self.drive_start_time == entry.drive_start
            && self.drive_end_time == entry.drive_end
    }

    /// Overwrite the content of `entry`, keeping its local id.
    pub fn apply_to(&self, entry: &mut WorkEntry, last_modified_at: DateTime<Utc>) {
        entry.remote_id = Some(self.id.clone());
        entry.user_id.clone_from(&self.user_id);
        entry.technician_name.clone_from(&self.technician_name);
        entry.customer_name.clone_from(&self.customer_name);
        entry.clock_in = self.clock_in_time;
        entry.clock_out = self.clock_out_time;
        entry.lunch_start = self.lunch_start_time;
        entry.lunch_end = self.lunch_end_time;
        entry.drive_start = self.drive_start_time;
        entry.drive_end = self.drive_end_time;
        entry.is_synced = true;
        entry.needs_sync = false;
        entry.sync_rejection = None;
        entry.last_modified_at = last_modified_at;
    }
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<String>,
    pub details: Option<String>,
    pub message: Option<String>,
}

/// Identifiers are numeric on some deployments and strings on others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(value) => value,
        Raw::Integer(value) => value.to_string(),
    })
}

/// ISO-8601 UTC timestamps with millisecond precision, e.g. `2024-01-15T08:00:00.000Z`.
pub mod iso_millis {
    use super::{DateTime, SecondsFormat, Serializer, Utc};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[allow(clippy::ref_option)] // signature required by `serialize_with`
    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&format(value)),
            None => serializer.serialize_none(),
        }
    }
}
