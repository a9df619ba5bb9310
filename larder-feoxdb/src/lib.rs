#![warn(missing_docs)]
//! Durable [`PersistentStore`](larder_store::PersistentStore) backend on FeOxDB.
//!
//! Use this when cached objects must survive restarts (offline-first
//! clients). For tests and ephemeral caches, `larder_store::MemoryStore`
//! is enough.

mod error;
mod store;

pub use error::FeOxDbError;
pub use store::{FeOxDbStore, FeOxDbStoreBuilder};
