//! HTTP routes definition

use axum::{routing::get, Router};

use super::handlers;

/// Prime lookup routes
///
/// - GET /api?pi=N                  - Single prime by index
/// - GET /api/primes/:index         - Single prime by index
/// - GET /api/range?start=A&end=B   - Primes for indices A..=B
/// - GET /stats                     - Store and cache statistics
pub fn api_routes() -> Router {
    Router::new()
        .route("/api", get(handlers::prime_query))
        .route("/api/primes/:index", get(handlers::prime_by_path))
        .route("/api/range", get(handlers::prime_range))
        .route("/stats", get(handlers::stats))
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(handlers::health))
}
