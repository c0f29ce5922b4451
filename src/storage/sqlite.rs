//! SQLite checkpoint store
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::state::CrawlState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::{CheckpointRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

/// SQLite checkpoint backend
pub struct CheckpointManager {
    conn: Connection,
}

impl CheckpointManager {
    /// Opens or creates the checkpoint database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn upsert_checkpoint(
    tx: &Transaction<'_>,
    state: &CrawlState,
    status: RunStatus,
) -> StorageResult<()> {
    let json = serde_json::to_string(state)?;
    let now = Utc::now().to_rfc3339();
    let cursor = &state.cursor;

    tx.execute(
        "INSERT INTO checkpoints (
            name, status, config_hash, state, record_count, file_count, buffered,
            cell_index, category_index, page_index, done, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        ON CONFLICT(name) DO UPDATE SET
            status = excluded.status,
            config_hash = excluded.config_hash,
            state = excluded.state,
            record_count = excluded.record_count,
            file_count = excluded.file_count,
            buffered = excluded.buffered,
            cell_index = excluded.cell_index,
            category_index = excluded.category_index,
            page_index = excluded.page_index,
            done = excluded.done,
            updated_at = excluded.updated_at",
        params![
            state.params.name,
            status.to_db_string(),
            state.config_hash,
            json,
            state.record_count as i64,
            state.file_count as i64,
            state.buffer.len() as i64,
            cursor.cell_index as i64,
            cursor.category_index as i64,
            cursor.page_index as i64,
            cursor.done,
            now,
        ],
    )?;
    Ok(())
}

fn read_status(row: &Row<'_>, index: usize) -> rusqlite::Result<RunStatus> {
    Ok(RunStatus::from_db_string(&row.get::<_, String>(index)?).unwrap_or(RunStatus::Failed))
}

impl CheckpointStore for CheckpointManager {
    // ===== Run Management =====

    fn begin_run(
        &mut self,
        name: &str,
        config_hash: &str,
        record_count: u64,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (name, started_at, config_hash, status, start_record_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                now,
                config_hash,
                RunStatus::Running.to_db_string(),
                record_count as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_runs(&self, name: &str) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, started_at, finished_at, config_hash, status,
                    start_record_count, end_record_count
             FROM runs WHERE name = ?1 ORDER BY id",
        )?;

        let runs = stmt
            .query_map(params![name], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    config_hash: row.get(4)?,
                    status: read_status(row, 5)?,
                    start_record_count: row.get::<_, i64>(6)? as u64,
                    end_record_count: row.get::<_, Option<i64>>(7)?.map(|n| n as u64),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    // ===== Snapshots =====

    fn save(&mut self, state: &CrawlState, status: RunStatus) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        upsert_checkpoint(&tx, state, status)?;
        tx.commit()?;
        Ok(())
    }

    fn save_and_end_run(
        &mut self,
        state: &CrawlState,
        status: RunStatus,
        run_id: i64,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        upsert_checkpoint(&tx, state, status)?;

        let now = Utc::now().to_rfc3339();
        let updated = tx.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, end_record_count = ?3 WHERE id = ?4",
            params![
                status.to_db_string(),
                now,
                state.record_count as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }

        tx.commit()?;
        Ok(())
    }

    fn load(&self, name: &str) -> StorageResult<Option<CrawlState>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM checkpoints WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let state: CrawlState =
                    serde_json::from_str(&json).map_err(|e| StorageError::Corrupt {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn get_checkpoint(&self, name: &str) -> StorageResult<Option<CheckpointRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT name, status, config_hash, record_count, file_count, buffered,
                        cell_index, category_index, page_index, done, created_at, updated_at
                 FROM checkpoints WHERE name = ?1",
                params![name],
                |row| {
                    Ok(CheckpointRecord {
                        name: row.get(0)?,
                        status: read_status(row, 1)?,
                        config_hash: row.get(2)?,
                        record_count: row.get::<_, i64>(3)? as u64,
                        file_count: row.get::<_, i64>(4)? as u64,
                        buffered: row.get::<_, i64>(5)? as u64,
                        cell_index: row.get::<_, i64>(6)? as u64,
                        category_index: row.get::<_, i64>(7)? as u64,
                        page_index: row.get::<_, i64>(8)? as u64,
                        done: row.get(9)?,
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    fn discard(&mut self, name: &str) -> StorageResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM checkpoints WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }
}
