//! State module for tracking crawl progress
//!
//! This module provides the serializable state of a crawl.
//!
//! # Components
//!
//! - `CrawlCursor`: the (cell, category, page) position of the next request
//! - `RecordBuffer`: records accumulated since the last flush
//! - `RateRule`: consumption of one quota rule
//! - `CrawlState`: the aggregate persisted by the checkpoint manager

mod buffer;
mod crawl_state;
mod cursor;
mod rate_rule;

// Re-export main types
pub use buffer::{Point, RawRecord, RecordBuffer};
pub use crawl_state::{Category, CrawlParams, CrawlState};
pub use cursor::{Advance, CrawlCursor, Position, SearchSpace};
pub use rate_rule::{RateRule, RuleSnapshot};
