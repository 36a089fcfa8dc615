//! Synchronization with the remote time entry service.
//!
//! A cycle runs strictly in order: tombstones are deleted remotely, pending
//! entries are pushed, the remote set is pulled and reconciled into the local
//! store, and finally the retention policy trims old synced entries.

mod engine;
mod error;
mod in_flight;
mod reconcile;
mod remote;
mod retention;
mod wire;

#[cfg(test)]
mod fake;

pub use engine::{PushOutcome, SyncEngine, SyncReport};
pub use error::{RemoteError, SyncError};
pub use in_flight::{InFlightGuard, InFlightSet};
pub use reconcile::{reconcile, ReconcileCounts, ReconcileOutcome, MATCH_WINDOW_SECS};
pub use remote::{HttpRemoteStore, RemoteResult, RemoteStore};
pub use retention::expired_entries;
pub use wire::{iso_millis, EntryPayload, RemoteEntry};
