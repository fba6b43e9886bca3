//! HTTP handler tests over an in-memory store

use axum::body::Body;
use axum::http::{Request, StatusCode};
use primedex::config::CacheConfig;
use primedex::server::{router, AppState, ServerConfig};
use primedex::sieve::SegmentedSieve;
use primedex::storage::MockSegmentStore;
use primedex::PrimeDatabase;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(store: MockSegmentStore) -> axum::Router {
    let db = PrimeDatabase::new(Arc::new(store), &CacheConfig::default());
    router(AppState {
        db: Arc::new(db),
        config: ServerConfig::default(),
    })
}

fn app() -> axum::Router {
    let primes: Vec<u64> = SegmentedSieve::new(1000).take(1000).collect();
    app_with(MockSegmentStore::from_primes(&primes, 100).expect("Failed to build store"))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("Request failed");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = serde_json::from_slice(&body).expect("Body is not JSON");
    (status, json)
}

#[tokio::test]
async fn test_prime_query() {
    let (status, body) = get(app(), "/api?pi=1000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], 1000);
    assert_eq!(body["prime"], 7919);

    let (status, body) = get(app(), "/api/primes/10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prime"], 29);
}

#[tokio::test]
async fn test_invalid_and_out_of_range_index() {
    for uri in ["/api?pi=0", "/api?pi=-5", "/api?pi=abc", "/api/primes/zero"] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Invalid prime index");
    }

    let (status, body) = get(app(), "/api?pi=1001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Index out of range");
    assert_eq!(body["current_max"], 1000);
    assert_eq!(body["requested"], 1001);

    let (status, body) = get(app(), "/api").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing prime index");
}

#[tokio::test]
async fn test_empty_store_reports_building() {
    let (status, body) = get(app_with(MockSegmentStore::new()), "/api?pi=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["current_max"], 0);
    assert_eq!(body["suggestion"], "Database is still building");
}

#[tokio::test]
async fn test_range() {
    let (status, body) = get(app(), "/api/range?start=998&end=1001").await;
    assert_eq!(status, StatusCode::OK);
    let primes = body["primes"].as_array().expect("primes array");
    assert_eq!(primes.len(), 4);
    assert_eq!(primes[2]["prime"], 7919);
    assert!(primes[3]["prime"].is_null());
    assert!(primes[3]["error"].is_string());

    let (status, _) = get(app(), "/api/range?start=1&end=5000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_and_health() {
    let (status, body) = get(app(), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"]["max_prime_index"], 1000);
    assert_eq!(body["database"]["total_segments"], 10);
    assert_eq!(body["database"]["status"], "not_started");
    assert!(body["cache"]["hit_rate"].is_number());
    assert_eq!(body["version"], primedex::VERSION);

    let (status, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database_available"], true);
}
