//! Output sink traits and error types
//!
//! This module defines the trait interface for batch writers and
//! associated error types.

use crate::state::RecordBuffer;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed input file {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Identifies one batch handed to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchId {
    /// Output file counter before this batch
    pub file_number: u64,

    /// Grid cell whose page completed the batch
    pub cell_index: usize,
}

/// Destination for flushed record batches
///
/// A call either produces one complete artifact or fails without leaving a
/// partial one behind. Implementations are never called with an empty batch.
pub trait RecordSink: Send {
    /// Writes `batch` and returns an identifier of the written artifact
    fn write_batch(&mut self, batch: &RecordBuffer, id: BatchId) -> OutputResult<String>;
}
