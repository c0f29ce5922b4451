//! Administrative-boundary lookup
//!
//! Resolves a region name, citycode or adcode to the bounding box of its
//! boundary polyline using the vendor's district service. This runs once per
//! crawl, before any search request, and its result is cached in the crawl state.

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::crawler::{is_success_status, RateLimiter};
use crate::region::BoundingBox;
use crate::SweepError;

const DISTRICT_PATH: &str = "/v3/config/district";

/// Client for the district (administrative boundary) endpoint
pub struct DistrictClient {
    client: Client,
    endpoint: Url,
    key: String,
    limiter: Arc<RateLimiter>,
}

impl DistrictClient {
    pub fn new(
        client: Client,
        base_url: &str,
        key: &str,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, SweepError> {
        let endpoint = Url::parse(base_url)?.join(DISTRICT_PATH)?;
        Ok(Self {
            client,
            endpoint,
            key: key.to_string(),
            limiter,
        })
    }

    /// Looks up `keyword` and returns the envelope of its best-matching boundary
    ///
    /// # Errors
    ///
    /// * `SweepError::RegionNotFound` - no district matched, or it has no usable boundary
    /// * `SweepError::Http` / `SweepError::Decode` - transport or body failure
    pub async fn resolve(&self, keyword: &str) -> Result<BoundingBox, SweepError> {
        let body = self.query(keyword).await?;

        if !is_success_status(&body) {
            let info = body.get("info").and_then(Value::as_str).unwrap_or("unknown");
            tracing::warn!("District lookup for '{}' failed: {}", keyword, info);
            return Err(SweepError::RegionNotFound(keyword.to_string()));
        }

        let polyline = body
            .get("districts")
            .and_then(Value::as_array)
            .and_then(|districts| districts.first())
            .and_then(|best| best.get("polyline"))
            .and_then(Value::as_str)
            .ok_or_else(|| SweepError::RegionNotFound(keyword.to_string()))?;

        let lines = parse_polyline(polyline)
            .ok_or_else(|| SweepError::RegionNotFound(keyword.to_string()))?;

        let bbox = BoundingBox::enclosing(lines.into_iter().flatten())
            .ok_or_else(|| SweepError::RegionNotFound(keyword.to_string()))?;

        tracing::info!(
            "Region '{}' spans lng [{}, {}], lat [{}, {}]",
            keyword,
            bbox.min_lng,
            bbox.max_lng,
            bbox.min_lat,
            bbox.max_lat
        );

        Ok(bbox)
    }

    async fn query(&self, keyword: &str) -> Result<Value, SweepError> {
        self.limiter.acquire().await;

        let context = format!("district '{}'", keyword);
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("key", self.key.as_str()),
                ("keywords", keyword),
                ("subdistrict", "1"),
                ("extensions", "all"),
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

        serde_json::from_slice(&bytes).map_err(|e| SweepError::Decode {
            context,
            message: e.to_string(),
        })
    }
}

/// Parses a boundary polyline: rings separated by `|`, points by `;`, `lng,lat` pairs
///
/// Returns `None` if any coordinate is malformed or the polyline is empty.
pub fn parse_polyline(polyline: &str) -> Option<Vec<Vec<(f64, f64)>>> {
    let polyline = polyline.trim();
    if polyline.is_empty() {
        return None;
    }

    polyline
        .split('|')
        .map(|ring| {
            ring.split(';')
                .map(|pair| {
                    let (lng, lat) = pair.split_once(',')?;
                    Some((lng.trim().parse().ok()?, lat.trim().parse().ok()?))
                })
                .collect::<Option<Vec<(f64, f64)>>>()
        })
        .collect()
}
