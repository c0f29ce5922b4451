//! Search API fetcher
//!
//! This module handles all search requests for the crawler, including:
//! - Building the HTTP client shared by every request
//! - Issuing one (cell, category, page) polygon search
//! - Separating API soft failures (no records) from transport and decode failures
//! - Throttling every request through the shared rate limiter

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::crawler::RateLimiter;
use crate::region::GridCell;
use crate::state::{Category, RawRecord};
use crate::SweepError;

const POLYGON_SEARCH_PATH: &str = "/v3/place/polygon";

/// A source of search results, one page at a time
///
/// Implementations return the decoded records verbatim. A page shorter than
/// the fixed page size is the last page of its (cell, category). Transport and
/// decode failures are returned as errors and never retried here.
#[async_trait]
pub trait PoiSource: Send + Sync {
    async fn fetch(
        &self,
        cell: &GridCell,
        category: &Category,
        page: usize,
    ) -> Result<Vec<RawRecord>, SweepError>;
}

/// A source whose every request first acquires the shared rate limiter
///
/// The crawl loop only accepts this type, so no request leaves unthrottled.
pub struct RateLimitedSource<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S: PoiSource> RateLimitedSource<S> {
    pub fn new(inner: S, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl<S: PoiSource> PoiSource for RateLimitedSource<S> {
    async fn fetch(
        &self,
        cell: &GridCell,
        category: &Category,
        page: usize,
    ) -> Result<Vec<RawRecord>, SweepError> {
        self.limiter.acquire().await;
        self.inner.fetch(cell, category, page).await
    }
}

/// Builds the HTTP client used for every API request
pub fn build_http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true if an API response reports success (`"status": "1"`)
pub fn is_success_status(body: &Value) -> bool {
    match body.get("status") {
        Some(Value::String(s)) => s == "1",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Polygon search client for the vendor web service
pub struct AmapClient {
    client: Client,
    endpoint: Url,
    key: String,
    city: String,
    page_size: usize,
}

impl AmapClient {
    /// Creates a client searching within `city`
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client from [`build_http_client`]
    /// * `base_url` - Web service root, e.g. `https://restapi.amap.com`
    /// * `key` - API credential
    /// * `city` - Region scope; results outside it are excluded by the API
    /// * `page_size` - Records requested per page
    pub fn new(
        client: Client,
        base_url: &str,
        key: &str,
        city: &str,
        page_size: usize,
    ) -> Result<Self, SweepError> {
        let endpoint = Url::parse(base_url)?.join(POLYGON_SEARCH_PATH)?;
        Ok(Self {
            client,
            endpoint,
            key: key.to_string(),
            city: city.to_string(),
            page_size,
        })
    }
}

#[async_trait]
impl PoiSource for AmapClient {
    async fn fetch(
        &self,
        cell: &GridCell,
        category: &Category,
        page: usize,
    ) -> Result<Vec<RawRecord>, SweepError> {
        let context = format!("cell {} / {} / page {}", cell, category.code, page);

        // The service numbers pages from 1
        let page_param = (page + 1).to_string();
        let offset = self.page_size.to_string();
        let polygon = cell.to_polygon();

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("key", self.key.as_str()),
                ("polygon", polygon.as_str()),
                ("keywords", category.name.as_str()),
                ("types", category.code.as_str()),
                ("offset", offset.as_str()),
                ("page", page_param.as_str()),
                ("extensions", "all"),
                ("output", "json"),
                ("city", self.city.as_str()),
                ("citylimit", "true"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| SweepError::Http {
                context: context.clone(),
                source,
            })?;

        let bytes = response.bytes().await.map_err(|source| SweepError::Http {
            context: context.clone(),
            source,
        })?;

        let body: Value = serde_json::from_slice(&bytes).map_err(|e| SweepError::Decode {
            context: context.clone(),
            message: e.to_string(),
        })?;

        if !is_success_status(&body) {
            let info = body.get("info").and_then(Value::as_str).unwrap_or("unknown");
            tracing::warn!(
                "Search failed for {}: {} (treated as no records)",
                context,
                info
            );
            return Ok(Vec::new());
        }

        decode_pois(&body, &context)
    }
}

/// Extracts the record list of a successful search response
///
/// Every entry is kept, so the page length seen by the caller is the length
/// the service returned. An entry that is not an object fails the whole page.
fn decode_pois(body: &Value, context: &str) -> Result<Vec<RawRecord>, SweepError> {
    let Some(Value::Array(pois)) = body.get("pois") else {
        return Ok(Vec::new());
    };

    pois.iter()
        .enumerate()
        .map(|(i, poi)| {
            poi.as_object().cloned().ok_or_else(|| SweepError::Decode {
                context: context.to_string(),
                message: format!("entry {} of pois is not an object: {}", i, poi),
            })
        })
        .collect()
}
