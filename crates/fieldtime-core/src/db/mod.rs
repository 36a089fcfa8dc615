//! Local record store for fieldtime

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{EntryRepository, SqliteEntryRepository};
