use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::region::{partition, BoundingBox, GridCell};
use crate::state::buffer::RecordBuffer;
use crate::state::cursor::{CrawlCursor, SearchSpace};
use crate::state::rate_rule::RuleSnapshot;
use crate::SweepError;

/// A search category: display name (sent as keyword) and vendor code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub code: String,
}

impl Category {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Parameters fixed for the whole lifetime of a crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlParams {
    /// Checkpoint identifier
    pub name: String,

    /// Region the grid covers
    pub region: String,

    pub rows: u32,
    pub cols: u32,
    pub categories: Vec<Category>,

    /// Attributes retained per record
    pub fields: Vec<String>,

    pub flush_threshold: usize,
    pub page_size: usize,
}

impl CrawlParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.crawl.name.clone(),
            region: config.crawl.region.clone(),
            rows: config.crawl.rows,
            cols: config.crawl.cols,
            categories: config.categories.clone(),
            fields: config.output.fields.clone(),
            flush_threshold: config.crawl.flush_threshold,
            page_size: config.crawl.page_size,
        }
    }
}

/// Everything needed to resume a crawl: parameters, grid, cursor, counters and
/// the records buffered since the last flush
///
/// Created at crawl start, updated after every page and every flush, and
/// persisted by the checkpoint manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    pub params: CrawlParams,

    /// Hash of the configuration file the crawl was started with
    pub config_hash: String,

    pub bbox: BoundingBox,
    pub cells: Vec<GridCell>,
    pub cursor: CrawlCursor,

    /// Records taken from the API so far, flushed or not
    pub record_count: u64,

    /// Output files written so far; also names the next one
    pub file_count: u64,

    pub buffer: RecordBuffer,

    /// Rate-limiter consumption at the time of the last checkpoint
    #[serde(default)]
    pub rate_limits: Vec<RuleSnapshot>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlState {
    /// Builds the initial state of a crawl over `bbox`
    ///
    /// # Errors
    ///
    /// `SweepError::InvalidGrid` for a zero-sized grid, an invalid box or an
    /// empty category list.
    pub fn new(
        params: CrawlParams,
        bbox: BoundingBox,
        config_hash: impl Into<String>,
    ) -> Result<Self, SweepError> {
        if params.categories.is_empty() {
            return Err(SweepError::InvalidGrid(
                "category list is empty".to_string(),
            ));
        }
        if params.page_size == 0 || params.flush_threshold == 0 {
            return Err(SweepError::InvalidGrid(
                "page size and flush threshold must be > 0".to_string(),
            ));
        }

        let cells = partition(&bbox, params.rows, params.cols)?;
        let buffer = RecordBuffer::new(&params.fields);

        Ok(Self {
            params,
            config_hash: config_hash.into(),
            bbox,
            cells,
            cursor: CrawlCursor::new(),
            record_count: 0,
            file_count: 0,
            buffer,
            rate_limits: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn search_space(&self) -> SearchSpace {
        SearchSpace {
            cells: self.cells.len(),
            categories: self.params.categories.len(),
            page_size: self.params.page_size,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cursor.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CrawlParams {
        CrawlParams {
            name: "test".to_string(),
            region: "厦门".to_string(),
            rows: 2,
            cols: 3,
            categories: vec![Category::new("餐饮服务", "050000")],
            fields: vec!["id".to_string(), "name".to_string()],
            flush_threshold: 10,
            page_size: 20,
        }
    }

    #[test]
    fn test_new_state() {
        let state =
            CrawlState::new(params(), BoundingBox::new(117.8, 118.5, 24.2, 24.9), "hash").unwrap();

        assert_eq!(state.cells.len(), 6);
        assert_eq!(state.cursor, CrawlCursor::new());
        assert_eq!(state.record_count, 0);
        assert!(state.buffer.is_empty());
        assert_eq!(state.buffer.fields(), &["id", "name"]);
        assert_eq!(
            state.search_space(),
            SearchSpace {
                cells: 6,
                categories: 1,
                page_size: 20
            }
        );
        assert!(!state.is_done());
    }

    #[test]
    fn test_rejects_empty_categories() {
        let mut params = params();
        params.categories.clear();
        let result = CrawlState::new(params, BoundingBox::new(0.0, 1.0, 0.0, 1.0), "");
        assert!(matches!(result, Err(SweepError::InvalidGrid(_))));
    }

    #[test]
    fn test_rejects_zero_rows() {
        let mut params = params();
        params.rows = 0;
        let result = CrawlState::new(params, BoundingBox::new(0.0, 1.0, 0.0, 1.0), "");
        assert!(matches!(result, Err(SweepError::InvalidGrid(_))));
    }

    #[test]
    fn test_json_round_trip_preserves_buffer() {
        let mut state =
            CrawlState::new(params(), BoundingBox::new(117.8, 118.5, 24.2, 24.9), "hash").unwrap();
        let record = serde_json::json!({"id": "B1", "name": "n", "location": "118.0,24.5"});
        state.buffer.push(record.as_object().unwrap());
        state.record_count = 41;
        state.cursor.cell_index = 2;
        state.cursor.page_index = 3;

        let text = serde_json::to_string(&state).unwrap();
        let restored: CrawlState = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, state);
    }
}
