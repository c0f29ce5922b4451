//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::CrawlState;
use crate::storage::{CheckpointRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt checkpoint '{name}': {message}")]
    Corrupt { name: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store for crawl snapshots, keyed by crawl name
///
/// Every method that writes does so in a single transaction, so a reader
/// sees either the previous snapshot or the new one, never a mix.
pub trait CheckpointStore {
    // ===== Run Management =====

    /// Records the start of a run of crawl `name`
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn begin_run(&mut self, name: &str, config_hash: &str, record_count: u64)
        -> StorageResult<i64>;

    /// Gets the run history of a crawl, oldest first
    fn list_runs(&self, name: &str) -> StorageResult<Vec<RunRecord>>;

    // ===== Snapshots =====

    /// Writes `state` as the current snapshot of its crawl
    fn save(&mut self, state: &CrawlState, status: RunStatus) -> StorageResult<()>;

    /// Writes `state` and closes run `run_id` with the same status
    fn save_and_end_run(
        &mut self,
        state: &CrawlState,
        status: RunStatus,
        run_id: i64,
    ) -> StorageResult<()>;

    /// Reads the snapshot of crawl `name`, if one exists
    fn load(&self, name: &str) -> StorageResult<Option<CrawlState>>;

    /// Snapshot metadata without the serialized state
    fn get_checkpoint(&self, name: &str) -> StorageResult<Option<CheckpointRecord>>;

    /// Deletes the snapshot of crawl `name`; run history is kept
    fn discard(&mut self, name: &str) -> StorageResult<bool>;

    /// Marks a finished crawl terminal and closes its run
    ///
    /// A completed snapshot loads with its cursor done, so a later start goes
    /// straight to the completion action.
    fn complete(&mut self, state: &CrawlState, run_id: i64) -> StorageResult<()> {
        self.save_and_end_run(state, RunStatus::Completed, run_id)
    }
}
