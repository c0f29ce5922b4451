//! Configuration module for Poi-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! including resolving the category list from a reference table.
//!
//! # Example
//!
//! ```no_run
//! use poi_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Crawling {} categories", config.categories.len());
//! ```

mod categories;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, CategoryTableConfig, Config, CrawlConfig, OutputConfig, RateLimitEntry,
};

pub use categories::load_category_table;
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
