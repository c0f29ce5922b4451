use crate::config::types::{ApiConfig, Config, CrawlConfig, OutputConfig, RateLimitEntry};
use crate::state::Category;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_api_config(&config.api)?;
    validate_output_config(&config.output)?;
    validate_rate_limits(&config.rate_limits)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates grid shape and batching
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawl name cannot be empty".to_string(),
        ));
    }

    // The name keys the checkpoint and output files
    if config
        .name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(ConfigError::Validation(format!(
            "crawl name must not contain path separators, got '{}'",
            config.name
        )));
    }

    if config.region.trim().is_empty() {
        return Err(ConfigError::Validation(
            "region cannot be empty".to_string(),
        ));
    }

    if config.rows == 0 || config.cols == 0 {
        return Err(ConfigError::Validation(format!(
            "rows and cols must be > 0, got {}x{}",
            config.rows, config.cols
        )));
    }

    if config.flush_threshold == 0 {
        return Err(ConfigError::Validation(
            "flush-threshold must be > 0".to_string(),
        ));
    }

    if config.page_size == 0 {
        return Err(ConfigError::Validation(
            "page-size must be > 0".to_string(),
        ));
    }

    if let Some(bbox) = &config.bbox {
        if !bbox.is_valid() {
            return Err(ConfigError::Validation(format!(
                "bbox must have min <= max on both axes, got {:?}",
                bbox
            )));
        }
    }

    Ok(())
}

/// Validates API access settings
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    if config.key.trim().is_empty() {
        return Err(ConfigError::Validation("api key cannot be empty".to_string()));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must be http(s), got '{}'",
            config.base_url
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.fields.is_empty() {
        return Err(ConfigError::Validation(
            "at least one output field is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for field in &config.fields {
        if field.is_empty() {
            return Err(ConfigError::Validation(
                "output field names cannot be empty".to_string(),
            ));
        }
        if !seen.insert(field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate output field '{}'",
                field
            )));
        }
    }

    Ok(())
}

/// Validates quota rules
fn validate_rate_limits(rules: &[RateLimitEntry]) -> Result<(), ConfigError> {
    for rule in rules {
        if rule.limit == 0 || rule.window_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "rate-limit needs limit > 0 and window-secs > 0, got {}/{}s",
                rule.limit, rule.window_secs
            )));
        }
    }
    Ok(())
}

/// Validates the resolved category list
fn validate_categories(categories: &[Category]) -> Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[category]] or a [categories-table] is required".to_string(),
        ));
    }

    for category in categories {
        if category.code.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' has an empty code",
                category.name
            )));
        }
    }

    Ok(())
}
