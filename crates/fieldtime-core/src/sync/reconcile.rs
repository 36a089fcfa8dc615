//! Merge of pulled remote entries into the local set.
//!
//! `reconcile` is a pure function: it reads both sides and returns the local
//! entries to write. Pairing happens in two rounds. Entries are first paired
//! by remote id; what is left is paired by a time heuristic that recognizes
//! the remote copy of an entry whose create response never arrived.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use super::wire::RemoteEntry;
use crate::models::WorkEntry;

/// Two starts this close together are taken to be the same session.
pub const MATCH_WINDOW_SECS: i64 = 60;

/// How the pulled entries were merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub pulled: usize,
    pub matched_by_id: usize,
    pub matched_by_time: usize,
    /// Local content replaced by a newer remote copy
    pub overwritten: usize,
    /// Local remote id set by a time match
    pub linked: usize,
    pub inserted: usize,
}

/// Local entries to write, and what happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub upserts: Vec<WorkEntry>,
    pub counts: ReconcileCounts,
}

/// Merge `remote` into `local`.
///
/// Last writer wins per pair, comparing `last_modified_at` with the remote
/// `updatedAt`. When the service omits `updatedAt` the remote copy wins only
/// over local entries without unpushed changes. Tombstoned local entries are
/// never overwritten, and local entries missing from the pull are left alone.
/// New entries take `pulled_at` as their modification time when the remote
/// does not report one.
pub fn reconcile(
    local: &[WorkEntry],
    remote: &[RemoteEntry],
    pulled_at: DateTime<Utc>,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let mut local_paired = vec![false; local.len()];
    let mut seen_remote_ids = HashSet::new();
    let mut unmatched = Vec::new();

    for remote_entry in remote {
        if !seen_remote_ids.insert(remote_entry.id.as_str()) {
            tracing::warn!(remote_id = %remote_entry.id, "Duplicate remote id in pull; ignoring");
            continue;
        }
        outcome.counts.pulled += 1;

        let by_id = local.iter().enumerate().position(|(index, entry)| {
            !local_paired[index] && entry.remote_id.as_deref() == Some(remote_entry.id.as_str())
        });
        if let Some(index) = by_id {
            local_paired[index] = true;
            outcome.counts.matched_by_id += 1;
            resolve(&local[index], remote_entry, &mut outcome);
        } else {
            unmatched.push(remote_entry);
        }
    }

    for remote_entry in unmatched {
        if let Some(index) = closest_time_match(local, &local_paired, remote_entry) {
            local_paired[index] = true;
            outcome.counts.matched_by_time += 1;
            tracing::debug!(
                entry_id = %local[index].local_id,
                remote_id = %remote_entry.id,
                "Paired entries by start time"
            );
            resolve(&local[index], remote_entry, &mut outcome);
        } else {
            let modified = remote_entry.updated_at.unwrap_or(pulled_at);
            outcome.upserts.push(remote_entry.to_local(modified));
            outcome.counts.inserted += 1;
        }
    }

    outcome
}

fn resolve(local: &WorkEntry, remote: &RemoteEntry, outcome: &mut ReconcileOutcome) {
    if local.pending_deletion {
        if local.remote_id.is_none() {
            link(local, remote, outcome);
        }
        return;
    }

    let remote_is_newer = remote.updated_at.map_or(!local.needs_sync, |updated_at| {
        updated_at > local.last_modified_at
    });

    if remote_is_newer && !(remote.matches_content(local) && local.is_synced) {
        let mut entry = local.clone();
        let modified = remote.updated_at.unwrap_or(local.last_modified_at);
        remote.apply_to(&mut entry, modified);
        if local.remote_id.is_some() {
            entry.remote_id.clone_from(&local.remote_id);
        }
        outcome.upserts.push(entry);
        outcome.counts.overwritten += 1;
    } else if local.remote_id.is_none() {
        link(local, remote, outcome);
    }
}

/// Record the remote id on a local entry that keeps its own content.
fn link(local: &WorkEntry, remote: &RemoteEntry, outcome: &mut ReconcileOutcome) {
    let mut entry = local.clone();
    entry.remote_id = Some(remote.id.clone());
    outcome.upserts.push(entry);
    outcome.counts.linked += 1;
}

/// Unpaired local entry without a remote id, same customer, start within the window.
///
/// Clock-in and drive starts are compared; lunch start only when neither side has either.
fn closest_time_match(
    local: &[WorkEntry],
    local_paired: &[bool],
    remote: &RemoteEntry,
) -> Option<usize> {
    let window = Duration::seconds(MATCH_WINDOW_SECS);
    let distance = |a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>| {
        let (a, b) = (a?, b?);
        let delta = (a - b).abs();
        (delta <= window).then_some(delta)
    };

    local
        .iter()
        .enumerate()
        .filter(|(index, entry)| {
            !local_paired[*index]
                && entry.remote_id.is_none()
                && entry.customer_name == remote.customer_name
        })
        .filter_map(|(index, entry)| {
            let clock_in = distance(entry.clock_in, remote.clock_in_time);
            let drive = distance(entry.drive_start, remote.drive_start_time);
            let best = match (clock_in, drive) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            // A lunch-only session has no other start to compare
            let lunch_only = entry.clock_in.is_none()
                && entry.drive_start.is_none()
                && remote.clock_in_time.is_none()
                && remote.drive_start_time.is_none();
            let best = if lunch_only {
                distance(entry.lunch_start, remote.lunch_start_time)
            } else {
                best
            };
            best.map(|delta| (delta, index))
        })
        .min()
        .map(|(_, index)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LUNCH_BREAK_CUSTOMER;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, second).unwrap()
    }

    fn local(customer: &str, clock_in: DateTime<Utc>, modified: DateTime<Utc>) -> WorkEntry {
        let mut entry = WorkEntry::new("u1", "Sam Tech", customer, modified);
        entry.clock_in = Some(clock_in);
        entry
    }

    fn remote(id: &str, customer: &str, clock_in: DateTime<Utc>) -> RemoteEntry {
        RemoteEntry {
            id: id.to_string(),
            user_id: "u1".to_string(),
            technician_name: "Sam Tech".to_string(),
            customer_name: customer.to_string(),
            clock_in_time: Some(clock_in),
            clock_out_time: None,
            lunch_start_time: None,
            lunch_end_time: None,
            drive_start_time: None,
            drive_end_time: None,
            updated_at: None,
        }
    }

    #[test]
    fn newer_remote_overwrites_local() {
        let mut entry = local("Acme", at(8, 0, 0), at(9, 0, 0));
        entry.mark_synced("r1");

        let mut newer = remote("r1", "Acme", at(8, 0, 0));
        newer.clock_out_time = Some(at(12, 0, 0));
        newer.updated_at = Some(at(12, 0, 0));

        let outcome = reconcile(&[entry.clone()], &[newer], at(13, 0, 0));
        assert_eq!(outcome.upserts.len(), 1);
        let merged = &outcome.upserts[0];
        assert_eq!(merged.local_id, entry.local_id);
        assert_eq!(merged.clock_out, Some(at(12, 0, 0)));
        assert_eq!(merged.last_modified_at, at(12, 0, 0));
        assert!(merged.is_synced && !merged.needs_sync);
        assert_eq!(outcome.counts.overwritten, 1);
    }

    #[test]
    fn newer_local_is_kept() {
        let mut entry = local("Acme", at(8, 0, 0), at(12, 0, 0));
        entry.clock_out = Some(at(12, 0, 0));
        entry.remote_id = Some("r1".to_string());

        let mut older = remote("r1", "Acme", at(8, 0, 0));
        older.updated_at = Some(at(9, 0, 0));

        let outcome = reconcile(&[entry], &[older], at(13, 0, 0));
        assert!(outcome.upserts.is_empty());
        assert_eq!(outcome.counts.matched_by_id, 1);
    }

    #[test]
    fn missing_updated_at_never_beats_unpushed_changes() {
        let mut pending = local("Acme", at(8, 0, 0), at(12, 0, 0));
        pending.remote_id = Some("r1".to_string());
        pending.clock_out = Some(at(12, 0, 0));

        let outcome = reconcile(&[pending], &[remote("r1", "Acme", at(8, 0, 0))], at(13, 0, 0));
        assert!(outcome.upserts.is_empty());

        let mut acknowledged = local("Acme", at(8, 0, 0), at(12, 0, 0));
        acknowledged.mark_synced("r1");
        let mut edited_elsewhere = remote("r1", "Acme Corp", at(8, 0, 0));
        edited_elsewhere.clock_out_time = Some(at(11, 0, 0));

        let outcome = reconcile(&[acknowledged], &[edited_elsewhere], at(13, 0, 0));
        assert_eq!(outcome.upserts[0].customer_name, "Acme Corp");
        assert_eq!(outcome.upserts[0].last_modified_at, at(12, 0, 0));
    }

    #[test]
    fn fallback_match_by_start_time() {
        let entry = local("Acme", at(8, 0, 0), at(8, 0, 0));
        let copy = remote("R1", "Acme", at(8, 0, 30));

        let outcome = reconcile(&[entry.clone()], &[copy], at(8, 5, 0));
        assert_eq!(outcome.counts.matched_by_time, 1);
        assert_eq!(outcome.counts.inserted, 0);
        assert_eq!(outcome.upserts.len(), 1);
        assert_eq!(outcome.upserts[0].local_id, entry.local_id);
        assert_eq!(outcome.upserts[0].remote_id.as_deref(), Some("R1"));
        // Local has unpushed changes, so its content stays
        assert_eq!(outcome.upserts[0].clock_in, Some(at(8, 0, 0)));
    }

    #[test]
    fn fallback_requires_same_customer_and_window() {
        let entry = local("Acme", at(8, 0, 0), at(8, 0, 0));
        let other_customer = remote("R1", "Globex", at(8, 0, 10));
        let too_far = remote("R2", "Acme", at(8, 1, 1));

        let outcome = reconcile(&[entry], &[other_customer, too_far], at(9, 0, 0));
        assert_eq!(outcome.counts.matched_by_time, 0);
        assert_eq!(outcome.counts.inserted, 2);
    }

    #[test]
    fn fallback_uses_drive_start() {
        let mut entry = WorkEntry::new("u1", "Sam Tech", "Acme", at(7, 30, 0));
        entry.drive_start = Some(at(7, 30, 0));
        let mut copy = remote("R1", "Acme", at(8, 0, 0));
        copy.clock_in_time = None;
        copy.drive_start_time = Some(at(7, 30, 45));

        let outcome = reconcile(&[entry], &[copy], at(9, 0, 0));
        assert_eq!(outcome.counts.matched_by_time, 1);
    }

    #[test]
    fn fallback_matches_lunch_only_sessions() {
        let mut entry = WorkEntry::new("u1", "Sam Tech", LUNCH_BREAK_CUSTOMER, at(12, 0, 0));
        entry.lunch_start = Some(at(12, 0, 0));
        let mut copy = remote("R1", LUNCH_BREAK_CUSTOMER, at(12, 0, 0));
        copy.clock_in_time = None;
        copy.lunch_start_time = Some(at(12, 0, 20));

        let outcome = reconcile(&[entry.clone()], &[copy.clone()], at(12, 5, 0));
        assert_eq!(outcome.counts.matched_by_time, 1);
        assert_eq!(outcome.counts.inserted, 0);
        assert_eq!(outcome.upserts[0].local_id, entry.local_id);
        assert_eq!(outcome.upserts[0].remote_id.as_deref(), Some("R1"));

        copy.lunch_start_time = Some(at(12, 1, 1));
        let outcome = reconcile(&[entry], &[copy], at(12, 5, 0));
        assert_eq!(outcome.counts.matched_by_time, 0);
        assert_eq!(outcome.counts.inserted, 1);
    }

    #[test]
    fn each_local_pairs_at_most_once() {
        let entry = local("Acme", at(8, 0, 0), at(8, 0, 0));
        let first = remote("R1", "Acme", at(8, 0, 40));
        let second = remote("R2", "Acme", at(8, 0, 10));

        let outcome = reconcile(&[entry.clone()], &[first, second], at(9, 0, 0));
        assert_eq!(outcome.counts.matched_by_time, 1);
        assert_eq!(outcome.counts.inserted, 1);
        let linked = outcome
            .upserts
            .iter()
            .find(|upsert| upsert.local_id == entry.local_id)
            .unwrap();
        assert_eq!(linked.remote_id.as_deref(), Some("R1"));
    }

    #[test]
    fn entries_with_remote_id_skip_time_matching() {
        let mut entry = local("Acme", at(8, 0, 0), at(8, 0, 0));
        entry.mark_synced("R1");
        let copy = remote("R2", "Acme", at(8, 0, 5));

        let outcome = reconcile(&[entry], &[copy], at(9, 0, 0));
        assert_eq!(outcome.counts.inserted, 1);
        assert_eq!(outcome.upserts[0].remote_id.as_deref(), Some("R2"));
    }

    #[test]
    fn tombstones_are_never_overwritten() {
        let mut entry = local("Acme", at(8, 0, 0), at(8, 0, 0));
        entry.mark_synced("r1");
        entry.pending_deletion = true;

        let mut newer = remote("r1", "Acme", at(8, 0, 0));
        newer.updated_at = Some(at(12, 0, 0));

        let outcome = reconcile(&[entry], &[newer], at(13, 0, 0));
        assert!(outcome.upserts.is_empty());
        assert_eq!(outcome.counts.inserted, 0);
    }

    #[test]
    fn unmatched_remote_is_inserted_and_missing_local_left_alone() {
        let mut entry = local("Acme", at(8, 0, 0), at(8, 0, 0));
        entry.mark_synced("r-gone");

        let outcome = reconcile(&[entry], &[remote("r2", "Globex", at(10, 0, 0))], at(11, 0, 0));
        assert_eq!(outcome.upserts.len(), 1);
        let inserted = &outcome.upserts[0];
        assert_eq!(inserted.remote_id.as_deref(), Some("r2"));
        assert!(inserted.is_synced && !inserted.needs_sync);
        assert_eq!(inserted.last_modified_at, at(11, 0, 0));
    }

    #[test]
    fn duplicate_remote_ids_are_ignored() {
        let outcome = reconcile(
            &[],
            &[remote("r1", "Acme", at(8, 0, 0)), remote("r1", "Acme", at(8, 0, 0))],
            at(9, 0, 0),
        );
        assert_eq!(outcome.counts.pulled, 1);
        assert_eq!(outcome.upserts.len(), 1);
    }
}
