//! fieldtime-core - Core library for fieldtime
//!
//! This crate contains the work entry model, the on-device store, the clock
//! state machine and the offline-first sync engine used by every fieldtime
//! client.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{EntryId, WorkEntry};
