//! Storage module for persisting crawl checkpoints
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Saving and loading the crawl state snapshot
//! - Run tracking for the `--stats` history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::CheckpointManager;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a checkpoint database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file; parent directories are created
pub fn open_storage(path: &Path) -> StorageResult<CheckpointManager> {
    CheckpointManager::new(path)
}

/// Metadata of a stored checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    pub name: String,
    pub status: RunStatus,
    pub config_hash: String,
    pub record_count: u64,
    pub file_count: u64,
    pub buffered: u64,
    pub cell_index: u64,
    pub category_index: u64,
    pub page_index: u64,
    pub done: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Represents one start of a crawl
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub name: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub start_record_count: u64,
    pub end_record_count: Option<u64>,
}

/// Status of a crawl run or checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
