//! Work entry model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Customer name used for lunch taken outside any customer session.
pub const LUNCH_BREAK_CUSTOMER: &str = "Lunch Break";

/// A unique local identifier for an entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Why the remote store refused an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// HTTP 400: required fields missing or malformed
    Validation,
    /// HTTP 403: the caller may not modify this entry
    Forbidden,
}

impl RejectionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Forbidden => "forbidden",
        }
    }
}

impl FromStr for RejectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validation" => Ok(Self::Validation),
            "forbidden" => Ok(Self::Forbidden),
            other => Err(format!("unknown rejection kind '{other}'")),
        }
    }
}

/// A push the remote store refused; the entry is not retried until edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRejection {
    pub kind: RejectionKind,
    pub message: String,
}

/// Coarse sync status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Pending,
    LocalOnly,
    Deleting,
    Rejected,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::LocalOnly => "local",
            Self::Deleting => "deleting",
            Self::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// One technician's engagement with one customer: drive, work and lunch phases.
///
/// A phase is open while its start is set and its end is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEntry {
    /// Client-generated identifier, never reused
    pub local_id: EntryId,
    /// Identifier assigned by the remote store on first push
    pub remote_id: Option<String>,
    pub user_id: String,
    pub technician_name: String,
    pub customer_name: String,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub lunch_start: Option<DateTime<Utc>>,
    pub lunch_end: Option<DateTime<Utc>>,
    pub drive_start: Option<DateTime<Utc>>,
    pub drive_end: Option<DateTime<Utc>>,
    /// Remote store acknowledged the current content
    pub is_synced: bool,
    /// Local content diverged from the last acknowledged content
    pub needs_sync: bool,
    /// Tombstone, kept until the remote deletion is confirmed
    pub pending_deletion: bool,
    /// Most recent local mutation; the conflict-resolution clock
    pub last_modified_at: DateTime<Utc>,
    /// Set when the remote store refused the last push
    pub sync_rejection: Option<SyncRejection>,
}

impl WorkEntry {
    /// Create an empty, unsynced entry. Callers set the opening phase.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        technician_name: impl Into<String>,
        customer_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id: EntryId::new(),
            remote_id: None,
            user_id: user_id.into(),
            technician_name: technician_name.into(),
            customer_name: customer_name.into(),
            clock_in: None,
            clock_out: None,
            lunch_start: None,
            lunch_end: None,
            drive_start: None,
            drive_end: None,
            is_synced: false,
            needs_sync: true,
            pending_deletion: false,
            last_modified_at: now,
            sync_rejection: None,
        }
    }

    /// The session is still open.
    ///
    /// A clock-out closes the session regardless of other phases; otherwise a
    /// clock-in, an unfinished drive or an unfinished lunch keep it open.
    pub const fn is_active(&self) -> bool {
        if self.clock_out.is_some() {
            return false;
        }
        self.clock_in.is_some() || self.is_driving() || self.is_on_lunch()
    }

    pub const fn is_on_lunch(&self) -> bool {
        self.lunch_start.is_some() && self.lunch_end.is_none()
    }

    pub const fn is_driving(&self) -> bool {
        self.drive_start.is_some() && self.drive_end.is_none()
    }

    pub fn is_lunch_break(&self) -> bool {
        self.customer_name == LUNCH_BREAK_CUSTOMER
    }

    /// Timestamp used to place the entry on a calendar day.
    pub fn anchor_time(&self) -> Option<DateTime<Utc>> {
        self.clock_in.or(self.drive_start).or(self.lunch_start)
    }

    /// Clock-in to clock-out, when both are set.
    pub fn work_duration(&self) -> Option<Duration> {
        Some(self.clock_out? - self.clock_in?)
    }

    pub fn lunch_duration(&self) -> Option<Duration> {
        Some(self.lunch_end? - self.lunch_start?)
    }

    pub fn drive_duration(&self) -> Option<Duration> {
        Some(self.drive_end? - self.drive_start?)
    }

    pub const fn sync_status(&self) -> SyncStatus {
        if self.pending_deletion {
            SyncStatus::Deleting
        } else if self.sync_rejection.is_some() {
            SyncStatus::Rejected
        } else if self.needs_sync {
            SyncStatus::Pending
        } else if self.is_synced {
            SyncStatus::Synced
        } else {
            SyncStatus::LocalOnly
        }
    }

    /// Record a successful push. `remote_id` is only taken when none is set yet.
    pub fn mark_synced(&mut self, remote_id: &str) {
        if self.remote_id.is_none() {
            self.remote_id = Some(remote_id.to_string());
        }
        self.is_synced = true;
        self.needs_sync = false;
        self.sync_rejection = None;
    }

    /// Entry is eligible for the push pass.
    pub const fn is_push_candidate(&self) -> bool {
        self.needs_sync && !self.pending_deletion && self.sync_rejection.is_none()
    }
}

/// Format a duration as `HH:MM`.
pub fn format_hours_minutes(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
