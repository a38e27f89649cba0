//! Persisted client store: keeps the onboarding snapshot across restarts.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::{ProgressStore, STORAGE_KEY};
