//! Statistics from the checkpoint database
//!
//! This module provides functionality for extracting and displaying
//! the progress and run history of a named crawl.

use crate::storage::{CheckpointRecord, CheckpointStore, RunRecord};
use crate::SweepError;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub name: String,

    /// Stored snapshot, if the crawl has ever checkpointed
    pub checkpoint: Option<CheckpointRecord>,

    /// Number of grid cells in the crawl
    pub total_cells: usize,

    /// Number of categories searched per cell
    pub total_categories: usize,

    /// Every start of the crawl, oldest first
    pub runs: Vec<RunRecord>,
}

impl CrawlStatistics {
    /// Share of (cell, category) pairs already searched, in percent
    pub fn progress_percent(&self) -> Option<f64> {
        let checkpoint = self.checkpoint.as_ref()?;
        if checkpoint.done {
            return Some(100.0);
        }
        let total = (self.total_cells * self.total_categories) as f64;
        if total == 0.0 {
            return None;
        }
        let searched = checkpoint.cell_index as f64 * self.total_categories as f64
            + checkpoint.category_index as f64;
        Some(searched / total * 100.0)
    }
}

/// Loads statistics for crawl `name` from storage
pub fn load_statistics(
    store: &dyn CheckpointStore,
    name: &str,
) -> Result<CrawlStatistics, SweepError> {
    let checkpoint = store.get_checkpoint(name)?;
    let (total_cells, total_categories) = match store.load(name)? {
        Some(state) => (state.cells.len(), state.params.categories.len()),
        None => (0, 0),
    };
    let runs = store.list_runs(name)?;

    Ok(CrawlStatistics {
        name: name.to_string(),
        checkpoint,
        total_cells,
        total_categories,
        runs,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics: {} ===\n", stats.name);

    match &stats.checkpoint {
        Some(cp) => {
            println!("Checkpoint:");
            println!("  Status: {}", cp.status.to_db_string());
            println!("  Records collected: {}", cp.record_count);
            println!("  Files written: {}", cp.file_count);
            println!("  Buffered (unflushed): {}", cp.buffered);
            if cp.done {
                println!("  Cursor: done ({} cells)", cp.cell_index);
            } else {
                println!(
                    "  Cursor: cell {}/{}, category {}/{}, page {}",
                    cp.cell_index + 1,
                    stats.total_cells,
                    cp.category_index + 1,
                    stats.total_categories,
                    cp.page_index
                );
            }
            if let Some(progress) = stats.progress_percent() {
                println!("  Progress: {:.1}%", progress);
            }
            println!("  Config hash: {}", cp.config_hash);
            println!("  Created: {}", cp.created_at);
            println!("  Updated: {}", cp.updated_at);
        }
        None => println!("No checkpoint stored."),
    }
    println!();

    if !stats.runs.is_empty() {
        println!("Runs ({}):", stats.runs.len());
        for run in &stats.runs {
            let records = match run.end_record_count {
                Some(end) => format!(
                    "{} -> {} (+{})",
                    run.start_record_count,
                    end,
                    end.saturating_sub(run.start_record_count)
                ),
                None => format!("{} -> ?", run.start_record_count),
            };
            println!(
                "  #{} {} started {} finished {} records {}",
                run.id,
                run.status.to_db_string(),
                run.started_at,
                run.finished_at.as_deref().unwrap_or("-"),
                records
            );
        }
    }
}
