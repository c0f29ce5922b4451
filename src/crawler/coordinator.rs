//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that walks the (cell, category, page)
//! search space, including:
//! - Fetching each page through the rate-limited source
//! - Buffering records and flushing full batches to the sink
//! - Periodic and exit-path checkpoints
//! - Handling interrupts, fatal errors and completion

use std::future::Future;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::Value;

use crate::crawler::fetcher::{PoiSource, RateLimitedSource};
use crate::output::{write_task_summary, BatchId, RecordSink, TaskSummary};
use crate::state::{Advance, CrawlState};
use crate::storage::{CheckpointStore, RunStatus};
use crate::SweepError;

/// Outcome of a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Records collected over the whole crawl, across resumptions
    pub record_count: u64,

    /// Output files written over the whole crawl
    pub file_count: u64,

    /// Pages fetched by this run only
    pub pages_fetched: u64,

    /// True if the crawl was already done when this run started
    pub already_complete: bool,
}

/// Drives one crawl from its current cursor to completion
pub struct Crawler<S: PoiSource> {
    state: CrawlState,
    source: RateLimitedSource<S>,
    sink: Box<dyn RecordSink>,
    store: Box<dyn CheckpointStore + Send>,
    checkpoint_every: u32,
    summary_dir: Option<PathBuf>,
    run_id: Option<i64>,
    pages_fetched: u64,
    pages_since_checkpoint: u32,
}

impl<S: PoiSource> Crawler<S> {
    /// Creates a crawler resuming `state` at its cursor
    ///
    /// # Arguments
    ///
    /// * `state` - Fresh or loaded crawl state
    /// * `source` - Search source; every request goes through its limiter
    /// * `sink` - Destination of flushed batches
    /// * `store` - Checkpoint store
    pub fn new(
        state: CrawlState,
        source: RateLimitedSource<S>,
        sink: Box<dyn RecordSink>,
        store: Box<dyn CheckpointStore + Send>,
    ) -> Self {
        Self {
            state,
            source,
            sink,
            store,
            checkpoint_every: 0,
            summary_dir: None,
            run_id: None,
            pages_fetched: 0,
            pages_since_checkpoint: 0,
        }
    }

    /// Saves a checkpoint every `pages` fetched pages (0 = only on exit)
    pub fn with_checkpoint_every(mut self, pages: u32) -> Self {
        self.checkpoint_every = pages;
        self
    }

    /// Writes `task.json` into `dir` on completion
    pub fn with_summary_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.summary_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Runs the crawl to completion
    ///
    /// On a fatal error the state is checkpointed with status `failed` before
    /// the error is returned, so a retry resumes without loss.
    pub async fn start(&mut self) -> Result<CrawlReport, SweepError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the crawl until it completes, fails, or `shutdown` resolves
    ///
    /// On shutdown the state is checkpointed with status `interrupted` and
    /// `SweepError::Interrupted` is returned.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlReport, SweepError>
    where
        F: Future<Output = ()>,
    {
        let run_id = self.store.begin_run(
            &self.state.params.name,
            &self.state.config_hash,
            self.state.record_count,
        )?;
        self.run_id = Some(run_id);

        if self.state.is_done() {
            tracing::info!(
                "Crawl '{}' is already complete; skipping to completion",
                self.state.params.name
            );
            return self.complete_or_fail(true).await;
        }

        let space = self.state.search_space();
        if self.state.cursor.settle(space) == Advance::Done {
            return self.complete_or_fail(false).await;
        }

        tracing::info!(
            "Starting crawl '{}' at {} ({} cells x {} categories, {} records so far)",
            self.state.params.name,
            self.state.cursor,
            space.cells,
            space.categories,
            self.state.record_count
        );

        let outcome = {
            tokio::pin!(shutdown);
            tokio::select! {
                result = self.drive() => Some(result),
                _ = &mut shutdown => None,
            }
        };

        match outcome {
            Some(Ok(())) => self.complete_or_fail(false).await,
            Some(Err(e)) => {
                tracing::error!("Crawl aborted at {}: {}", self.state.cursor, e);
                self.save_on_exit(RunStatus::Failed).await;
                Err(e)
            }
            None => {
                tracing::warn!("Crawl interrupted at {}", self.state.cursor);
                self.checkpoint_exit(RunStatus::Interrupted).await?;
                Err(SweepError::Interrupted)
            }
        }
    }

    /// The crawl loop
    ///
    /// State is consistent at every await point: a page's records enter the
    /// buffer and the cursor moves past it with no await in between.
    async fn drive(&mut self) -> Result<(), SweepError> {
        let space = self.state.search_space();
        let mut current_cell = None;

        while let Some(position) = self.state.cursor.position() {
            if current_cell != Some(position.cell) {
                tracing::info!("Searching cell {}/{}", position.cell + 1, space.cells);
                current_cell = Some(position.cell);
            }

            let cell = self.state.cells[position.cell];
            let category = self.state.params.categories[position.category].clone();

            let records = self
                .source
                .fetch(&cell, &category, position.page)
                .await?;
            self.pages_fetched += 1;

            tracing::debug!(
                "{} records for cell {} / {} / page {}",
                records.len(),
                position.cell,
                category.code,
                position.page
            );

            for record in &records {
                if !self.state.buffer.push(record) {
                    let id = record.get("id").and_then(Value::as_str).unwrap_or("?");
                    tracing::warn!("Record {} has no usable location", id);
                }
                self.state.record_count += 1;
            }
            self.state.cursor.advance(records.len(), space);

            let threshold = self.state.params.flush_threshold;
            while self.state.buffer.len() >= threshold {
                self.flush_batch(threshold, position.cell)?;
            }

            self.pages_since_checkpoint += 1;
            if self.checkpoint_every > 0 && self.pages_since_checkpoint >= self.checkpoint_every {
                self.checkpoint(RunStatus::Running).await?;
            }
        }

        Ok(())
    }

    /// Writes every buffered record as one batch
    ///
    /// Returns the artifact name, or `None` if the buffer was empty.
    pub fn flush(&mut self) -> Result<Option<String>, SweepError> {
        let cell_index = self.state.cursor.cell_index;
        self.flush_batch(self.state.buffer.len(), cell_index)
    }

    /// Writes the first `n` buffered records; they leave the buffer only once written
    fn flush_batch(&mut self, n: usize, cell_index: usize) -> Result<Option<String>, SweepError> {
        let n = n.min(self.state.buffer.len());
        if n == 0 {
            return Ok(None);
        }

        let batch = self.state.buffer.head(n);
        let id = BatchId {
            file_number: self.state.file_count,
            cell_index,
        };
        let name = self.sink.write_batch(&batch, id)?;

        self.state.file_count += 1;
        self.state.buffer.discard_head(n);
        Ok(Some(name))
    }

    /// Saves the current state, limiter counters included
    pub async fn checkpoint(&mut self, status: RunStatus) -> Result<(), SweepError> {
        self.state.rate_limits = self.source.limiter().snapshot().await;
        self.store.save(&self.state, status)?;
        self.pages_since_checkpoint = 0;
        tracing::debug!(
            "Checkpoint saved at {} ({} records, {} buffered)",
            self.state.cursor,
            self.state.record_count,
            self.state.buffer.len()
        );
        Ok(())
    }

    async fn checkpoint_exit(&mut self, status: RunStatus) -> Result<(), SweepError> {
        self.state.rate_limits = self.source.limiter().snapshot().await;
        match self.run_id {
            Some(run_id) => self.store.save_and_end_run(&self.state, status, run_id)?,
            None => self.store.save(&self.state, status)?,
        }
        tracing::info!(
            "Checkpoint saved at {} ({} records, {} buffered)",
            self.state.cursor,
            self.state.record_count,
            self.state.buffer.len()
        );
        Ok(())
    }

    /// Exit-path save whose own failure must not mask the original error
    async fn save_on_exit(&mut self, status: RunStatus) {
        if let Err(e) = self.checkpoint_exit(status).await {
            tracing::error!("Failed to save checkpoint: {}", e);
        }
    }

    async fn complete_or_fail(&mut self, already_complete: bool) -> Result<CrawlReport, SweepError> {
        match self.finish(already_complete).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Crawl could not be completed: {}", e);
                self.save_on_exit(RunStatus::Failed).await;
                Err(e)
            }
        }
    }

    /// Final flush, terminal checkpoint and task summary
    ///
    /// Safe to repeat: an empty buffer flushes nothing and the terminal
    /// artifacts are rewritten with the same totals.
    async fn finish(&mut self, already_complete: bool) -> Result<CrawlReport, SweepError> {
        self.flush()?;

        self.state.cursor.done = true;
        let finished_at = *self.state.finished_at.get_or_insert_with(Utc::now);

        self.state.rate_limits = self.source.limiter().snapshot().await;
        match self.run_id {
            Some(run_id) => self.store.complete(&self.state, run_id)?,
            None => self.store.save(&self.state, RunStatus::Completed)?,
        }

        if let Some(dir) = &self.summary_dir {
            write_task_summary(dir, &TaskSummary::from_state(&self.state, finished_at))?;
        }

        tracing::info!(
            "Crawl '{}' complete: {} records in {} files",
            self.state.params.name,
            self.state.record_count,
            self.state.file_count
        );

        Ok(CrawlReport {
            record_count: self.state.record_count,
            file_count: self.state.file_count,
            pages_fetched: self.pages_fetched,
            already_complete,
        })
    }
}
