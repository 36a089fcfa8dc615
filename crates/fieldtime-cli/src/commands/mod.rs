pub mod clock;
pub mod common;
pub mod config;
pub mod delete;
pub mod list;
pub mod status;
pub mod sync;
