//! SQLite backend for the Hangar detection engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every multi-statement operation runs
//! inside one transaction on that thread, which is what makes the
//! add-if-absent merges atomic.
//!
//! Besides the engine's own state, the store keeps the catalog, registry, and
//! evidence tables that the external import processes populate, and serves
//! them through the collaborator traits.

mod encode;
mod schema;
mod sources;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
