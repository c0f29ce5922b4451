//! Crawler module for the grid search
//!
//! This module contains the core crawling logic, including:
//! - The composite rate limiter shared by every outbound request
//! - The search API client and the rate-limited source wrapper
//! - The crawl loop with flushing and checkpointing
//! - Crawl setup: region resolution, checkpoint resumption, manifests

mod coordinator;
mod fetcher;
mod limiter;

pub use coordinator::{CrawlReport, Crawler};
pub use fetcher::{build_http_client, is_success_status, AmapClient, PoiSource, RateLimitedSource};
pub use limiter::RateLimiter;

use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::output::{write_params, GeoJsonSink};
use crate::region::DistrictClient;
use crate::state::{CrawlParams, CrawlState};
use crate::storage::{open_storage, CheckpointStore};
use crate::SweepError;

/// Runs a complete crawl, checkpointing on Ctrl-C
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the checkpoint database
/// 2. Resume the stored crawl, or resolve the region and start a fresh one
/// 3. Write the parameter manifest
/// 4. Walk every (cell, category, page) through the rate limiter
/// 5. Write the terminal task summary
///
/// # Arguments
///
/// * `config` - The crawl configuration
/// * `config_hash` - Hash of the configuration file, stored with the checkpoint
/// * `fresh` - Discard any stored checkpoint first
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    fresh: bool,
) -> Result<CrawlReport, SweepError> {
    run_crawl_until(config, config_hash, fresh, ctrl_c()).await
}

/// Like [`run_crawl`], stopping with a checkpoint when `shutdown` resolves
pub async fn run_crawl_until<F>(
    config: &Config,
    config_hash: &str,
    fresh: bool,
    shutdown: F,
) -> Result<CrawlReport, SweepError>
where
    F: Future<Output = ()>,
{
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
    let client = build_http_client(config.api.timeout_secs)?;

    let checkpoint_path = config.checkpoint_path();
    let mut store = open_storage(&checkpoint_path)?;
    let name = &config.crawl.name;

    if fresh && store.discard(name)? {
        tracing::info!("Discarded checkpoint of crawl '{}'", name);
    }

    let existing = if config.crawl.resume && !fresh {
        store.load(name)?
    } else {
        None
    };

    let state = match existing {
        Some(state) => {
            if state.config_hash != config_hash {
                tracing::warn!(
                    "Configuration changed since crawl '{}' started; resuming with its stored parameters",
                    name
                );
            }
            let restored = limiter.restore(&state.rate_limits).await;
            tracing::info!(
                "Resuming crawl '{}' from {} at {} ({} records, {} rate rules restored)",
                name,
                checkpoint_path.display(),
                state.cursor,
                state.record_count,
                restored
            );
            state
        }
        None => {
            let bbox = match config.crawl.bbox {
                Some(bbox) => bbox,
                None => {
                    DistrictClient::new(
                        client.clone(),
                        &config.api.base_url,
                        &config.api.key,
                        limiter.clone(),
                    )?
                    .resolve(&config.crawl.region)
                    .await?
                }
            };
            tracing::info!(
                "Region '{}' spans lng {:.6}..{:.6}, lat {:.6}..{:.6}",
                config.crawl.region,
                bbox.min_lng,
                bbox.max_lng,
                bbox.min_lat,
                bbox.max_lat
            );
            CrawlState::new(CrawlParams::from_config(config), bbox, config_hash)?
        }
    };

    write_params(config, &state)?;

    let api = AmapClient::new(
        client,
        &config.api.base_url,
        &config.api.key,
        &state.params.region,
        state.params.page_size,
    )?;
    let sink = GeoJsonSink::new(&config.output.directory, &state.params.region);

    let mut crawler = Crawler::new(
        state,
        RateLimitedSource::new(api, limiter),
        Box::new(sink),
        Box::new(store),
    )
    .with_checkpoint_every(config.crawl.checkpoint_every)
    .with_summary_dir(&config.output.directory);

    crawler.run_until(shutdown).await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::warn!("Received Ctrl-C, saving checkpoint"),
        Err(e) => {
            tracing::error!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
