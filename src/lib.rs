//! Poi-Sweep: a resumable grid crawler for points of interest
//!
//! This crate crawls a paginated, rate-limited place-search API over a grid of
//! bounding boxes covering an administrative region, writes results in batches,
//! and checkpoints its progress so an interrupted crawl resumes exactly where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod postprocess;
pub mod region;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Poi-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {context}: {source}")]
    Http {
        context: String,
        source: reqwest::Error,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Malformed response for {context}: {message}")]
    Decode { context: String, message: String },

    #[error("No boundary found for region '{0}'")]
    RegionNotFound(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl interrupted, progress checkpointed")]
    Interrupted,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read category table: {0}")]
    CategoryTable(#[from] csv::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Poi-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use region::{partition, BoundingBox, GridCell};
pub use state::{Category, CrawlCursor, CrawlState, RateRule};
