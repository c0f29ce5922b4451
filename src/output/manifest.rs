//! Crawl manifests
//!
//! `params.json` records the configuration a crawl runs with and is written
//! at every start; `task.json` is the terminal artifact written on completion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Config, RateLimitEntry};
use crate::output::traits::OutputResult;
use crate::output::write_atomic;
use crate::region::BoundingBox;
use crate::state::{CrawlParams, CrawlState};

pub const PARAMS_FILE: &str = "params.json";
pub const TASK_FILE: &str = "task.json";

const REDACTED: &str = "<redacted>";

#[derive(Debug, Serialize)]
struct ParamsManifest<'a> {
    #[serde(flatten)]
    params: &'a CrawlParams,
    api_key: &'static str,
    base_url: &'a str,
    rate_limits: &'a [RateLimitEntry],
    bbox: &'a BoundingBox,
    cells: usize,
    config_hash: &'a str,
    output_directory: &'a Path,
    written_at: DateTime<Utc>,
}

/// Summary of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub name: String,
    pub region: String,
    pub record_count: u64,
    pub file_count: u64,
    pub cells: usize,
    pub categories: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskSummary {
    pub fn from_state(state: &CrawlState, finished_at: DateTime<Utc>) -> Self {
        Self {
            name: state.params.name.clone(),
            region: state.params.region.clone(),
            record_count: state.record_count,
            file_count: state.file_count,
            cells: state.cells.len(),
            categories: state.params.categories.len(),
            started_at: state.started_at,
            finished_at,
        }
    }
}

/// Writes `params.json` into the output directory, with the API key redacted
pub fn write_params(config: &Config, state: &CrawlState) -> OutputResult<PathBuf> {
    let directory = &config.output.directory;
    let manifest = ParamsManifest {
        params: &state.params,
        api_key: REDACTED,
        base_url: &config.api.base_url,
        rate_limits: &config.rate_limits,
        bbox: &state.bbox,
        cells: state.cells.len(),
        config_hash: &state.config_hash,
        output_directory: directory,
        written_at: Utc::now(),
    };

    let path = directory.join(PARAMS_FILE);
    write_atomic(&path, &serde_json::to_vec_pretty(&manifest)?)?;
    tracing::debug!("Wrote crawl parameters to {}", path.display());
    Ok(path)
}

/// Writes `task.json` into `directory`
pub fn write_task_summary(directory: &Path, summary: &TaskSummary) -> OutputResult<PathBuf> {
    let path = directory.join(TASK_FILE);
    write_atomic(&path, &serde_json::to_vec_pretty(summary)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, CrawlConfig, OutputConfig};
    use crate::state::Category;

    fn config(directory: &Path) -> Config {
        Config {
            crawl: CrawlConfig {
                name: "xm".to_string(),
                region: "厦门".to_string(),
                rows: 2,
                cols: 2,
                flush_threshold: 500,
                page_size: 20,
                resume: true,
                checkpoint_every: 50,
                bbox: None,
            },
            api: ApiConfig {
                key: "secret-key-123".to_string(),
                base_url: "https://restapi.amap.com".to_string(),
                timeout_secs: 30,
            },
            output: OutputConfig {
                directory: directory.to_path_buf(),
                fields: vec!["id".to_string(), "name".to_string()],
                checkpoint_path: None,
            },
            rate_limits: vec![RateLimitEntry {
                limit: 50,
                window_secs: 1,
            }],
            categories: vec![Category::new("餐饮服务", "050000")],
            categories_table: None,
        }
    }

    #[test]
    fn test_params_redacts_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let state = CrawlState::new(
            CrawlParams::from_config(&config),
            BoundingBox::new(117.8, 118.5, 24.2, 24.9),
            "hash",
        )
        .unwrap();

        let path = write_params(&config, &state).unwrap();
        let text = std::fs::read_to_string(path).unwrap();

        assert!(!text.contains("secret-key-123"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["api_key"], REDACTED);
        assert_eq!(value["region"], "厦门");
        assert_eq!(value["cells"], 4);
        assert_eq!(value["rate_limits"][0]["window-secs"], 1);
        assert_eq!(value["categories"][0]["code"], "050000");
    }

    #[test]
    fn test_task_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut state = CrawlState::new(
            CrawlParams::from_config(&config),
            BoundingBox::new(117.8, 118.5, 24.2, 24.9),
            "hash",
        )
        .unwrap();
        state.record_count = 55;
        state.file_count = 2;

        let summary = TaskSummary::from_state(&state, Utc::now());
        let path = write_task_summary(dir.path(), &summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(value["record_count"], 55);
        assert_eq!(value["file_count"], 2);
        assert_eq!(value["cells"], 4);
    }
}
