//! Currency API, Health and Metrics Endpoints
//!
//! # Endpoints
//!
//! - `GET /currency/all` - Every cached summary
//! - `GET /currency/{symbol}` - One summary, fetched on a cache miss
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness check (simple OK)
//! - `GET /readyz` - Readiness check (ticker stream connected)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{FeedCoordinator, SummaryService};
use crate::domain::store::StoreError;
use crate::domain::summary::SummaryRecord;
use crate::infrastructure::hitbtc::{ConnectionState, FeedHealth};
use crate::infrastructure::metrics::{get_metrics_handle, set_cache_entries};

const NO_DATA_FOUND: &str = "No data Found";
const NOT_A_VALID_SYMBOL: &str = "Not a valid Symbol";

// =============================================================================
// Response Types
// =============================================================================

/// `GET /currency/all` body.
#[derive(Debug, Clone, Serialize)]
pub struct CurrenciesResponse {
    /// Every cached summary.
    pub currencies: Vec<SummaryRecord>,
}

/// Error body for the currency API.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Cache statistics.
    pub cache: CacheStatus,
    /// Ticker stream status.
    pub feed: FeedInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Stream connected and every supported symbol subscribed.
    Healthy,
    /// Serving, but live updates are missing for some or all symbols.
    Degraded,
    /// No reference data; every lookup is rejected.
    Unhealthy,
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Cached symbols.
    pub entries: usize,
    /// Symbols listed by the exchange.
    pub listed: usize,
    /// Symbols eligible for caching.
    pub supported: usize,
    /// Symbols with a live subscription.
    pub active_subscriptions: usize,
}

/// Ticker stream status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: ConnectionState,
    /// Whether the stream is connected.
    pub connected: bool,
    /// Ticker notifications received.
    pub messages_received: u64,
    /// Updates dropped on full channels.
    pub updates_dropped: u64,
    /// Undecodable frames.
    pub decode_errors: u64,
    /// Connect attempts since the last success.
    pub connect_attempts: u32,
    /// Time of the last successful connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last connection error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the API server.
pub struct ApiState {
    version: String,
    started_at: Instant,
    service: Arc<SummaryService>,
    coordinator: Arc<FeedCoordinator>,
    feed_health: Arc<FeedHealth>,
}

impl ApiState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        version: String,
        service: Arc<SummaryService>,
        coordinator: Arc<FeedCoordinator>,
        feed_health: Arc<FeedHealth>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            service,
            coordinator,
            feed_health,
        }
    }
}

/// Build the router. Exposed separately so it can be driven without a
/// socket.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/currency/all", get(all_currencies_handler))
        .route("/currency/{symbol}", get(currency_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server for the currency API, health checks and metrics.
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ApiState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the server hits a fatal
    /// error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn all_currencies_handler(State(state): State<Arc<ApiState>>) -> Response {
    match state.service.all_cached() {
        Ok(currencies) => (StatusCode::OK, Json(CurrenciesResponse { currencies })).into_response(),
        Err(StoreError::EmptyCache) => {
            (StatusCode::NOT_FOUND, Json(ErrorResponse::new(NO_DATA_FOUND))).into_response()
        }
    }
}

async fn currency_handler(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
) -> Response {
    if !state.service.is_listed(&symbol) {
        return (StatusCode::NOT_FOUND, Json(ErrorResponse::new(NOT_A_VALID_SYMBOL)))
            .into_response();
    }

    match state.service.lookup(&symbol).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            tracing::warn!(symbol = %symbol, error = %e, "Currency lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if state.feed_health.is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// Render Prometheus metrics.
///
/// The cache size gauge is sampled here rather than on every write.
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    set_cache_entries(state.service.cached_count());
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &ApiState) -> HealthResponse {
    let health = &state.feed_health;
    let feed = FeedInfo {
        state: health.state(),
        connected: health.is_connected(),
        messages_received: health.messages_received(),
        updates_dropped: health.updates_dropped(),
        decode_errors: health.decode_errors(),
        connect_attempts: health.connect_attempts(),
        last_connected_at: health.last_connected_at(),
        last_error: health.error_message(),
    };

    let cache = CacheStatus {
        entries: state.service.cached_count(),
        listed: state.service.listed_count(),
        supported: state.service.supported_count(),
        active_subscriptions: state.coordinator.active_count(),
    };

    HealthResponse {
        status: determine_health_status(&cache, &feed),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        cache,
        feed,
    }
}

const fn determine_health_status(cache: &CacheStatus, feed: &FeedInfo) -> HealthStatus {
    if cache.listed == 0 {
        HealthStatus::Unhealthy
    } else if feed.connected && cache.active_subscriptions >= cache.supported {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

// =============================================================================
// Errors
// =============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
