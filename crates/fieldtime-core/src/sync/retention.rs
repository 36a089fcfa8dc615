//! Post-pull cleanup of old, fully synced local entries.

use chrono::{DateTime, Utc};

use crate::config::RetentionPolicy;
use crate::models::{EntryId, WorkEntry};

/// Entries of `user_id` that the policy no longer keeps.
///
/// Entries with unpushed work, a tombstone, a rejection or an open session
/// always stay, as do entries without any timestamp to place them.
pub fn expired_entries(
    entries: &[WorkEntry],
    user_id: &str,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<EntryId> {
    let Some((start, end)) = policy.window(now) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.user_id == user_id && is_settled(entry))
        .filter(|entry| {
            entry
                .anchor_time()
                .is_some_and(|anchor| anchor < start || anchor >= end)
        })
        .map(|entry| entry.local_id)
        .collect()
}

const fn is_settled(entry: &WorkEntry) -> bool {
    !entry.needs_sync
        && !entry.pending_deletion
        && entry.sync_rejection.is_none()
        && !entry.is_active()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn synced_session(user_id: &str, start: DateTime<Utc>) -> WorkEntry {
        let mut entry = WorkEntry::new(user_id, "Sam Tech", "Acme", start);
        entry.clock_in = Some(start);
        entry.clock_out = Some(start + Duration::hours(1));
        entry.mark_synced("r1");
        entry
    }

    #[test]
    fn drops_old_synced_entries_only() {
        let now = Utc::now();
        let old = synced_session("u1", now - Duration::days(3));
        let recent = synced_session("u1", now);
        let someone_else = synced_session("u2", now - Duration::days(3));

        let mut pending = synced_session("u1", now - Duration::days(3));
        pending.needs_sync = true;

        let mut active = synced_session("u1", now - Duration::days(3));
        active.clock_out = None;

        let entries = [old.clone(), recent, someone_else, pending, active];
        let expired = expired_entries(&entries, "u1", RetentionPolicy::Today, now);
        assert_eq!(expired, vec![old.local_id]);
    }

    #[test]
    fn trailing_days_and_keep_all() {
        let now = Utc::now();
        let entries = [synced_session("u1", now - Duration::days(3))];

        assert!(expired_entries(&entries, "u1", RetentionPolicy::TrailingDays(7), now).is_empty());
        assert_eq!(
            expired_entries(&entries, "u1", RetentionPolicy::TrailingDays(1), now).len(),
            1
        );
        assert!(expired_entries(&entries, "u1", RetentionPolicy::KeepAll, now).is_empty());
    }
}
