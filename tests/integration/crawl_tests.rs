//! Integration tests for the crawler
//!
//! These tests use wiremock as the vendor web service and run the full
//! crawl cycle end-to-end: region lookup, paged search, flushing,
//! checkpointing and resumption.

use poi_sweep::config::{ApiConfig, Config, CrawlConfig, OutputConfig, RateLimitEntry};
use poi_sweep::crawler::{run_crawl_until, CrawlReport};
use poi_sweep::region::{partition, BoundingBox};
use poi_sweep::state::Category;
use poi_sweep::storage::{open_storage, CheckpointStore, RunStatus};
use poi_sweep::SweepError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const KEY: &str = "test-key";
const PAGE_SIZE: usize = 20;

fn bbox() -> BoundingBox {
    BoundingBox::new(117.8, 118.6, 24.2, 24.8)
}

/// Creates a test configuration for a 2x2 grid over `bbox()`
fn create_test_config(base_url: &str, output: &Path, flush_threshold: usize) -> Config {
    Config {
        crawl: CrawlConfig {
            name: "xiamen-food".to_string(),
            region: "厦门".to_string(),
            rows: 2,
            cols: 2,
            flush_threshold,
            page_size: PAGE_SIZE,
            resume: true,
            checkpoint_every: 0,
            bbox: Some(bbox()),
        },
        api: ApiConfig {
            key: KEY.to_string(),
            base_url: base_url.to_string(),
            timeout_secs: 5,
        },
        output: OutputConfig {
            directory: output.to_path_buf(),
            fields: vec!["id".to_string(), "name".to_string(), "address".to_string()],
            checkpoint_path: None,
        },
        rate_limits: vec![RateLimitEntry {
            limit: 1000,
            window_secs: 1,
        }],
        categories: vec![Category::new("餐饮服务", "050000")],
        categories_table: None,
    }
}

/// Serves paged search results per grid cell
struct SearchResponder {
    polygons: Vec<String>,
    totals: HashMap<usize, usize>,
    broken_cell: Option<(usize, Arc<AtomicBool>)>,
    slow_cell: Option<(usize, Arc<AtomicBool>)>,
}

impl SearchResponder {
    fn new(totals: &[(usize, usize)]) -> Self {
        Self {
            polygons: partition(&bbox(), 2, 2)
                .unwrap()
                .iter()
                .map(|cell| cell.to_polygon())
                .collect(),
            totals: totals.iter().copied().collect(),
            broken_cell: None,
            slow_cell: None,
        }
    }
}

impl Respond for SearchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();

        let Some(cell) = self
            .polygons
            .iter()
            .position(|p| Some(p) == query.get("polygon"))
        else {
            return ResponseTemplate::new(400);
        };
        let page: usize = query
            .get("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);

        if let Some((broken, flag)) = &self.broken_cell {
            if *broken == cell && flag.load(Ordering::SeqCst) {
                return ResponseTemplate::new(500);
            }
        }

        let total = self.totals.get(&cell).copied().unwrap_or(0);
        // Pages are numbered from 1 on the wire
        let start = ((page - 1) * PAGE_SIZE).min(total);
        let end = (page * PAGE_SIZE).min(total);
        let pois: Vec<Value> = (start..end)
            .map(|i| {
                json!({
                    "id": format!("B{}-{}", cell, i),
                    "name": format!("餐厅 {}", i),
                    "address": if i % 2 == 0 { json!("思明区") } else { json!([]) },
                    "location": "118.089,24.479",
                    "typecode": "050000",
                })
            })
            .collect();

        let response = ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "info": "OK",
            "count": total.to_string(),
            "pois": pois,
        }));

        match &self.slow_cell {
            Some((slow, flag)) if *slow == cell && flag.load(Ordering::SeqCst) => {
                response.set_delay(Duration::from_secs(30))
            }
            _ => response,
        }
    }
}

async fn mount_search(server: &MockServer, responder: SearchResponder) {
    Mock::given(method("GET"))
        .and(path("/v3/place/polygon"))
        .and(query_param("key", KEY))
        .and(query_param("offset", "20"))
        .and(query_param("types", "050000"))
        .and(query_param("city", "厦门"))
        .and(query_param("citylimit", "true"))
        .respond_with(responder)
        .mount(server)
        .await;
}

async fn crawl(config: &Config, fresh: bool) -> Result<CrawlReport, SweepError> {
    run_crawl_until(config, "hash", fresh, std::future::pending::<()>()).await
}

fn geojson_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".geojson"))
        .collect();
    names.sort();
    names
}

fn feature_count(dir: &Path) -> usize {
    geojson_files(dir)
        .iter()
        .map(|name| {
            let text = std::fs::read_to_string(dir.join(name)).unwrap();
            let value: Value = serde_json::from_str(&text).unwrap();
            value["features"].as_array().unwrap().len()
        })
        .sum()
}

#[tokio::test]
async fn test_full_crawl_with_region_lookup() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/config/district"))
        .and(query_param("keywords", "厦门"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "info": "OK",
            "districts": [{
                "name": "厦门市",
                "polyline": "117.8,24.2;118.6,24.2;118.6,24.8|118.0,24.5;117.8,24.8",
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_search(&server, SearchResponder::new(&[(0, 55)])).await;

    let mut config = create_test_config(&server.uri(), output.path(), 25);
    config.crawl.bbox = None;

    let report = crawl(&config, false).await.unwrap();

    assert_eq!(report.record_count, 55);
    assert_eq!(report.file_count, 3);
    // Three pages for the first cell, one empty page for each of the others
    assert_eq!(report.pages_fetched, 6);

    assert_eq!(
        geojson_files(output.path()),
        vec![
            "0_厦门_0.geojson".to_string(),
            "1_厦门_0.geojson".to_string(),
            "2_厦门_4.geojson".to_string(),
        ]
    );
    assert_eq!(feature_count(output.path()), 55);

    let first: Value = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("0_厦门_0.geojson")).unwrap(),
    )
    .unwrap();
    assert_eq!(first["features"][0]["properties"]["address"], "思明区");
    assert_eq!(first["features"][1]["properties"]["address"], "");
    assert_eq!(
        first["features"][0]["geometry"]["coordinates"],
        json!([118.089, 24.479])
    );

    let params = std::fs::read_to_string(output.path().join("params.json")).unwrap();
    assert!(!params.contains(KEY));
    let params: Value = serde_json::from_str(&params).unwrap();
    assert_eq!(params["bbox"]["min-lng"], 117.8);
    assert_eq!(params["bbox"]["max-lat"], 24.8);

    let task: Value = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("task.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(task["record_count"], 55);
}

#[tokio::test]
async fn test_region_not_found_is_fatal() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/config/district"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "districts": [],
        })))
        .mount(&server)
        .await;
    mount_search(&server, SearchResponder::new(&[(0, 5)])).await;

    let mut config = create_test_config(&server.uri(), output.path(), 25);
    config.crawl.bbox = None;

    let result = crawl(&config, false).await;
    assert!(matches!(result, Err(SweepError::RegionNotFound(_))));

    // Nothing was searched and nothing was checkpointed
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.path() == "/v3/config/district"));
    let store = open_storage(&config.checkpoint_path()).unwrap();
    assert!(store.load(&config.crawl.name).unwrap().is_none());
}

#[tokio::test]
async fn test_region_lookup_failure_status_is_fatal() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/config/district"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0",
            "info": "INVALID_USER_KEY",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri(), output.path(), 25);
    config.crawl.bbox = None;

    let result = crawl(&config, false).await;
    assert!(matches!(result, Err(SweepError::RegionNotFound(_))));
}

#[tokio::test]
async fn test_soft_failure_counts_as_no_records() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/place/polygon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0",
            "info": "DAILY_QUERY_OVER_LIMIT",
        })))
        .expect(4)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), output.path(), 25);
    let report = crawl(&config, false).await.unwrap();

    assert_eq!(report.record_count, 0);
    assert_eq!(report.pages_fetched, 4);
    assert!(geojson_files(output.path()).is_empty());
}

#[tokio::test]
async fn test_malformed_page_entry_is_decode_failure() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    let mut pois: Vec<Value> = (0..19)
        .map(|i| json!({"id": format!("B{}", i), "location": "118.089,24.479"}))
        .collect();
    pois.push(json!("not a record"));

    Mock::given(method("GET"))
        .and(path("/v3/place/polygon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "info": "OK",
            "pois": pois,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), output.path(), 25);
    let result = crawl(&config, false).await;
    assert!(matches!(result, Err(SweepError::Decode { .. })));

    // Nothing from the malformed page is counted and the cursor has not moved
    let store = open_storage(&config.checkpoint_path()).unwrap();
    let meta = store.get_checkpoint(&config.crawl.name).unwrap().unwrap();
    assert_eq!(meta.status, RunStatus::Failed);
    assert_eq!(meta.record_count, 0);
    assert_eq!((meta.cell_index, meta.category_index, meta.page_index), (0, 0, 0));
    assert!(!meta.done);
}

#[tokio::test]
async fn test_transport_failure_checkpoints_then_resumes() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    let broken = Arc::new(AtomicBool::new(true));
    let mut responder = SearchResponder::new(&[(0, 30), (1, 7), (2, 41), (3, 3)]);
    responder.broken_cell = Some((2, broken.clone()));
    mount_search(&server, responder).await;

    let config = create_test_config(&server.uri(), output.path(), 10);

    let result = crawl(&config, false).await;
    assert!(matches!(result, Err(SweepError::Http { .. })));

    {
        let store = open_storage(&config.checkpoint_path()).unwrap();
        let meta = store.get_checkpoint(&config.crawl.name).unwrap().unwrap();
        assert_eq!(meta.status, RunStatus::Failed);
        assert_eq!(meta.record_count, 37);
        assert_eq!((meta.cell_index, meta.category_index, meta.page_index), (2, 0, 0));
        // 37 records at a threshold of 10: three files written, seven buffered
        assert_eq!(meta.file_count, 3);
        assert_eq!(meta.buffered, 7);
    }

    broken.store(false, Ordering::SeqCst);
    let report = crawl(&config, false).await.unwrap();

    assert_eq!(report.record_count, 81);
    // Cell 2 (20 + 20 + 1) and cell 3 (3) only
    assert_eq!(report.pages_fetched, 4);
    assert_eq!(feature_count(output.path()), 81);

    let store = open_storage(&config.checkpoint_path()).unwrap();
    let statuses: Vec<RunStatus> = store
        .list_runs(&config.crawl.name)
        .unwrap()
        .iter()
        .map(|r| r.status)
        .collect();
    assert_eq!(statuses, vec![RunStatus::Failed, RunStatus::Completed]);
}

#[tokio::test]
async fn test_interrupt_checkpoints_then_resumes() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    let slow = Arc::new(AtomicBool::new(true));
    let mut responder = SearchResponder::new(&[(0, 21), (1, 4), (3, 2)]);
    responder.slow_cell = Some((1, slow.clone()));
    mount_search(&server, responder).await;

    let config = create_test_config(&server.uri(), output.path(), 100);

    let result = run_crawl_until(
        &config,
        "hash",
        false,
        tokio::time::sleep(Duration::from_millis(500)),
    )
    .await;
    assert!(matches!(result, Err(SweepError::Interrupted)));

    {
        let store = open_storage(&config.checkpoint_path()).unwrap();
        let meta = store.get_checkpoint(&config.crawl.name).unwrap().unwrap();
        assert_eq!(meta.status, RunStatus::Interrupted);
        assert_eq!(meta.cell_index, 1);
        assert_eq!(meta.record_count, 21);
        assert_eq!(meta.buffered, 21);
    }
    assert!(geojson_files(output.path()).is_empty());

    slow.store(false, Ordering::SeqCst);
    let report = crawl(&config, false).await.unwrap();
    assert_eq!(report.record_count, 27);
    assert_eq!(feature_count(output.path()), 27);
}

#[tokio::test]
async fn test_completed_crawl_short_circuits_unless_fresh() {
    let server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();
    mount_search(&server, SearchResponder::new(&[(1, 12)])).await;

    let config = create_test_config(&server.uri(), output.path(), 100);

    let first = crawl(&config, false).await.unwrap();
    assert_eq!(first.record_count, 12);
    assert_eq!(first.pages_fetched, 4);

    let again = crawl(&config, false).await.unwrap();
    assert!(again.already_complete);
    assert_eq!(again.pages_fetched, 0);
    assert_eq!(again.record_count, 12);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);

    let fresh = crawl(&config, true).await.unwrap();
    assert!(!fresh.already_complete);
    assert_eq!(fresh.pages_fetched, 4);
    assert_eq!(fresh.record_count, 12);
}
