//! Data models for fieldtime

mod entry;

pub use entry::{
    format_hours_minutes, EntryId, RejectionKind, SyncRejection, SyncStatus, WorkEntry,
    LUNCH_BREAK_CUSTOMER,
};
