//! Services shared by client surfaces.

mod entries;

pub use entries::EntryService;
