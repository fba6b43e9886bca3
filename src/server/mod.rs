//! HTTP query layer
//!
//! Read-only JSON endpoints over a `PrimeDatabase`. The builder is never
//! reachable from here.

pub mod handlers;
pub mod routes;

use axum::{extract::Extension, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::database::PrimeDatabase;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: String,
    /// HTTP port
    pub http_port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0".to_string(),
            http_port: 3007,
            enable_cors: true,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PrimeDatabase>,
    pub config: ServerConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let app = Router::new()
        .merge(routes::api_routes())
        .merge(routes::health_routes())
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve `db` until the process is stopped.
pub async fn start_server(config: ServerConfig, db: Arc<PrimeDatabase>) -> anyhow::Result<()> {
    info!(
        addr = %config.http_addr,
        port = config.http_port,
        "Starting primedex HTTP server"
    );

    match db.get_stats().await {
        Ok(stats) => info!(
            max_prime_index = stats.max_prime_index,
            segments = stats.total_segments,
            status = %stats.status,
            "Prime database loaded"
        ),
        Err(e) => error!(error = %e, "Prime database not available, lookups will fail until it is built"),
    }

    let addr = format!("{}:{}", config.http_addr, config.http_port);
    let app = router(AppState { db, config });
    let listener = TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server failed: {}", e)
    })
}
