//! Key-Value Store Adapters
//!
//! - `JsonFileStore`: one file per key under a data directory
//! - `MemoryStore`: process-local map for tests and ephemeral runs

mod file_store;
mod memory_store;

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;
