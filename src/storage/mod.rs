//! Storage module for ledger persistence

pub mod persistence;

pub use persistence::{Snapshot, Storage, StorageConfig, StorageError, StorageStats};
