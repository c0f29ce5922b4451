use crate::config::categories::load_category_table;
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// When the file lists no `[[category]]` entries but names a
/// `[categories-table]`, the categories are read from that table before
/// validation, so a valid `Config` always carries its final category list.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use poi_sweep::config::load_config;
///
/// let config = load_config(Path::new("sweep.toml")).unwrap();
/// println!("Grid: {}x{}", config.crawl.rows, config.crawl.cols);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    if config.categories.is_empty() {
        if let Some(table) = &config.categories_table {
            // Relative table paths are resolved against the config file
            let table_path = match path.parent() {
                Some(dir) if table.path.is_relative() => dir.join(&table.path),
                _ => table.path.clone(),
            };
            config.categories =
                load_category_table(&table_path, &table.code_column, &table.name_column)?;
            tracing::debug!(
                "Loaded {} categories from {}",
                config.categories.len(),
                table_path.display()
            );
        }
    }

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is stored with the checkpoint to detect a configuration change
/// between the interrupted run and the resuming one.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
