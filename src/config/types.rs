use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::region::BoundingBox;
use crate::state::Category;

/// Main configuration structure for Poi-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,

    /// Quota rules shared by every outbound request
    #[serde(rename = "rate-limit", default = "default_rate_limits")]
    pub rate_limits: Vec<RateLimitEntry>,

    /// Explicit category list
    #[serde(rename = "category", default)]
    pub categories: Vec<Category>,

    /// Reference table used when no explicit categories are given
    #[serde(rename = "categories-table")]
    pub categories_table: Option<CategoryTableConfig>,
}

/// Crawl shape and progress behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Stable identifier of this crawl, used to key the checkpoint
    pub name: String,

    /// Administrative region (name, citycode or adcode)
    pub region: String,

    /// Number of grid rows the region is split into
    pub rows: u32,

    /// Number of grid columns the region is split into
    pub cols: u32,

    /// Records per output file
    #[serde(rename = "flush-threshold", default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Fixed page size requested from the API; a shorter page is the last one
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: usize,

    /// Resume from an existing checkpoint when one is found
    #[serde(default = "default_true")]
    pub resume: bool,

    /// Pages between durable checkpoints (0 = only on exit)
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u32,

    /// Skips the region lookup when set
    pub bbox: Option<BoundingBox>,
}

/// Vendor API access
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API credential
    pub key: String,

    /// Base URL of the web service
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving batches and manifests
    pub directory: PathBuf,

    /// Record attributes retained in the output
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    /// Path to the checkpoint database
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: Option<PathBuf>,
}

/// One quota rule: `limit` calls per `window-secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub limit: u32,

    #[serde(rename = "window-secs")]
    pub window_secs: u64,
}

impl RateLimitEntry {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Reference table listing every category code
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryTableConfig {
    pub path: PathBuf,

    #[serde(rename = "code-column", default = "default_code_column")]
    pub code_column: String,

    #[serde(rename = "name-column", default = "default_name_column")]
    pub name_column: String,
}

impl Config {
    /// Location of the checkpoint database for this crawl
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output.checkpoint_path.clone().unwrap_or_else(|| {
            self.output
                .directory
                .join(format!("{}.checkpoint.db", self.crawl.name))
        })
    }
}

fn default_rate_limits() -> Vec<RateLimitEntry> {
    vec![
        RateLimitEntry {
            limit: 50,
            window_secs: 1,
        },
        RateLimitEntry {
            limit: 30_000,
            window_secs: 24 * 60 * 60,
        },
    ]
}

fn default_flush_threshold() -> usize {
    500
}

fn default_page_size() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_every() -> u32 {
    50
}

fn default_base_url() -> String {
    "https://restapi.amap.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fields() -> Vec<String> {
    vec!["id".to_string(), "name".to_string()]
}

fn default_code_column() -> String {
    "NEW_TYPE".to_string()
}

fn default_name_column() -> String {
    "小类".to_string()
}
