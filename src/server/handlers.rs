//! HTTP route handlers

use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::cache::CacheStats;
use crate::database::IndexedPrime;
use crate::error::Error;
use crate::server::AppState;
use crate::storage::GenerationStatus;

/// `?pi=` query string
#[derive(Debug, Deserialize)]
pub struct PrimeQuery {
    pub pi: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrimeResponse {
    pub index: u64,
    pub prime: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeResponse {
    pub start: i64,
    pub end: i64,
    pub primes: Vec<IndexedPrime>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub max_prime_index: u64,
    pub total_segments: u64,
    pub status: GenerationStatus,
    pub target_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub database: DatabaseSummary,
    pub cache: CacheStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Error payload shared by all endpoints
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            ..Self::default()
        }
    }

    fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

fn unavailable() -> Response {
    ErrorResponse {
        suggestion: Some("Database may still be building. Try again later.".to_string()),
        ..ErrorResponse::new("Database unavailable", "Prime database is not accessible")
    }
    .with_status(StatusCode::SERVICE_UNAVAILABLE)
}

fn invalid_index() -> Response {
    ErrorResponse {
        suggestion: Some("/api?pi=5".to_string()),
        ..ErrorResponse::new("Invalid prime index", "Index must be a positive integer")
    }
    .with_status(StatusCode::BAD_REQUEST)
}

fn out_of_range(requested: i64, current_max: u64) -> Response {
    let suggestion = if current_max == 0 {
        "Database is still building"
    } else {
        "Try a smaller index"
    };
    ErrorResponse {
        current_max: Some(current_max),
        requested: Some(requested),
        suggestion: Some(suggestion.to_string()),
        ..ErrorResponse::new(
            "Index out of range",
            format!("Index must be between 1 and {}", current_max),
        )
    }
    .with_status(StatusCode::BAD_REQUEST)
}

/// Status code and payload for a failed lookup
fn lookup_error(err: Error, requested: i64, current_max: u64) -> Response {
    match err {
        Error::OutOfRange(_) => invalid_index(),
        Error::NotFound(_) => out_of_range(requested, current_max),
        Error::InvalidArgument(message) => {
            ErrorResponse::new("Invalid request", message).with_status(StatusCode::BAD_REQUEST)
        }
        Error::StorageUnavailable(_) => unavailable(),
        other => {
            error!(index = requested, error = %other, "Prime lookup failed");
            ErrorResponse::new(
                "Prime lookup failed",
                "Unable to retrieve the requested prime from database",
            )
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn lookup(state: &AppState, raw: &str) -> Response {
    let current_max = match state.db.get_stats().await {
        Ok(stats) => stats.max_prime_index,
        Err(e) => {
            warn!(error = %e, "Stats unavailable");
            return unavailable();
        }
    };

    let index = match raw.trim().parse::<i64>() {
        Ok(index) if index >= 1 => index,
        _ => return invalid_index(),
    };
    if index as u64 > current_max {
        return out_of_range(index, current_max);
    }

    match state.db.get_prime_by_index(index).await {
        Ok(prime) => Json(PrimeResponse {
            index: index as u64,
            prime,
        })
        .into_response(),
        Err(e) => lookup_error(e, index, current_max),
    }
}

/// GET /api?pi=N
#[instrument(skip(state))]
pub async fn prime_query(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<PrimeQuery>,
) -> Response {
    match params.pi {
        Some(raw) => lookup(&state, &raw).await,
        None => ErrorResponse {
            suggestion: Some("/api?pi=5".to_string()),
            ..ErrorResponse::new("Missing prime index", "Query parameter pi is required")
        }
        .with_status(StatusCode::BAD_REQUEST),
    }
}

/// GET /api/primes/:index
#[instrument(skip(state))]
pub async fn prime_by_path(
    Extension(state): Extension<Arc<AppState>>,
    Path(index): Path<String>,
) -> Response {
    lookup(&state, &index).await
}

/// GET /api/range?start=A&end=B
#[instrument(skip(state))]
pub async fn prime_range(
    Extension(state): Extension<Arc<AppState>>,
    Query(range): Query<RangeQuery>,
) -> Response {
    match state.db.get_primes_by_index_range(range.start, range.end).await {
        Ok(primes) => Json(RangeResponse {
            start: range.start,
            end: range.end,
            primes,
        })
        .into_response(),
        Err(e) => lookup_error(e, range.start, 0),
    }
}

/// GET /stats
#[instrument(skip(state))]
pub async fn stats(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.db.get_stats().await {
        Ok(stats) => Json(StatsResponse {
            database: DatabaseSummary {
                max_prime_index: stats.max_prime_index,
                total_segments: stats.total_segments,
                status: stats.status,
                target_count: stats.target_count,
            },
            cache: state.db.cache_stats(),
            timestamp: chrono::Utc::now(),
            version: crate::VERSION.to_string(),
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Stats unavailable");
            ErrorResponse::new("Database unavailable", "Unable to retrieve database statistics")
                .with_status(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database_available: bool,
    pub max_prime_index: u64,
    pub version: String,
}

/// GET /health
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    let max_prime_index = state.db.get_stats().await.ok().map(|s| s.max_prime_index);
    Json(HealthResponse {
        status: "healthy".to_string(),
        database_available: max_prime_index.is_some(),
        max_prime_index: max_prime_index.unwrap_or(0),
        version: crate::VERSION.to_string(),
    })
}
