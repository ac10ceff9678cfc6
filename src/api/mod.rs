//! Congestion Query API
//!
//! HTTP API over the congestion state table, built with Axum. Every route
//! is read-only; the table is only ever written by the inbound link.
//!
//! # Endpoints
//!
//! ## Congestion
//! - `GET /api/v1/congestion` - All cells, most congested first
//! - `GET /api/v1/congestion/:cell_id` - One cell (404 if never seen)
//! - `GET /api/v1/heatmap` - Stadium-wide summary
//!
//! ## Relay
//! - `GET /api/v1/stats` - Relay counters and link states
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use congestion_relay::api::{serve, AppState};
//! use congestion_relay::config::Config;
//! use congestion_relay::link::MqttConnector;
//! use congestion_relay::relay::{Connectors, RelayController};
//! use congestion_relay::store::EntityStateTable;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let table = Arc::new(EntityStateTable::new());
//!     let relay = RelayController::start(
//!         &config,
//!         Arc::clone(&table),
//!         Connectors::shared(Arc::new(MqttConnector)),
//!     );
//!
//!     let state = AppState::new(table, relay.monitor());
//!     serve(state, &config.api).await?;
//!     relay.shutdown().await;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use crate::config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use dto::ServiceInfo;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/congestion", get(routes::congestion::list_congestion))
        .route("/congestion/:cell_id", get(routes::congestion::get_congestion))
        .route("/heatmap", get(routes::congestion::heatmap))
        .route("/stats", get(routes::stats::relay_stats));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(service_info))
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// GET /
async fn service_info() -> Json<ServiceInfo> {
    let endpoints = [
        "/health",
        "/health/live",
        "/health/ready",
        "/api/v1/congestion",
        "/api/v1/congestion/:cell_id",
        "/api/v1/heatmap",
        "/api/v1/stats",
    ];

    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    })
}

/// Start the API server; returns once a shutdown signal arrives
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Congestion API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Congestion API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
