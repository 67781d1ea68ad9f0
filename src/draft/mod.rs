//! Draft autosave: persistence, snapshots and debouncing

mod debounce;
mod snapshot;
mod store;

pub use debounce::{Debouncer, DEFAULT_DELAY};
pub use snapshot::DraftSnapshot;
pub use store::{DraftStore, FileDraftStore, MemoryDraftStore};
