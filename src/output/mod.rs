//! Output module for crawl artifacts
//!
//! This module handles:
//! - Writing flushed record batches as GeoJSON files
//! - Recording the crawl parameters and the terminal task summary
//! - Displaying checkpoint statistics

mod geojson;
pub mod manifest;
pub mod stats;
mod traits;

pub use geojson::{feature_collection, GeoJsonSink};
pub use manifest::{write_params, write_task_summary, TaskSummary};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{BatchId, OutputError, OutputResult, RecordSink};

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes `bytes` to `path` all-or-nothing
///
/// The data goes to a temporary file in the same directory, which is synced
/// and then renamed over `path`. Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> OutputResult<()> {
    let wrap = |source: std::io::Error| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let result = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(wrap(e));
    }
    Ok(())
}
