//! Summary Cache Binary
//!
//! Starts the market summary cache.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin summary-cache
//! ```
//!
//! # Environment Variables
//!
//! - `HITBTC_REST_URL`: REST base URL (default: <https://api.hitbtc.com/api/2>)
//! - `HITBTC_WS_URL`: WebSocket URL (default: <wss://api.hitbtc.com/api/2/ws>)
//! - `SUMMARY_CACHE_HTTP_PORT`: Currency API / health / metrics port (default: 8080)
//! - `SUMMARY_CACHE_SUPPORTED_SYMBOLS`: Comma list narrowing the supported set
//! - `SUMMARY_CACHE_REQUEST_TIMEOUT_MS`, `SUMMARY_CACHE_MAX_RETRIES`: REST tuning
//! - `SUMMARY_CACHE_FEED_CHANNEL_CAPACITY`, `SUMMARY_CACHE_RPC_TIMEOUT_MS`: Feed tuning
//! - `SUMMARY_CACHE_CONNECT_DELAY_INITIAL_MS`, `SUMMARY_CACHE_CONNECT_DELAY_MAX_SECS`,
//!   `SUMMARY_CACHE_CONNECT_MAX_ATTEMPTS`: Feed connect backoff
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`: Tracing export
//! - `RUST_LOG`: Log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use summary_cache::infrastructure::hitbtc::{BackoffConfig, supervise_feed};
use summary_cache::infrastructure::telemetry;
use summary_cache::{
    ApiServer, ApiState, FeedCoordinator, FeedError, HitBtcRestClient, HitBtcStreamClient,
    ReferenceData, RestClientConfig, ServiceConfig, StreamClientConfig,
    SummaryService, SummaryStore, init_metrics, load_reference_data,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffered side-channel feed errors.
const FEED_ERROR_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init();

    tracing::info!(
        span_export = telemetry_guard.is_exporting(),
        "Starting summary cache"
    );

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
    }

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Pull path
    let rest_client = Arc::new(
        HitBtcRestClient::new(RestClientConfig::from_settings(&config.exchange))
            .context("failed to build REST client")?,
    );

    let reference =
        match load_reference_data(rest_client.as_ref(), config.supported_symbols.clone()).await {
            Ok(reference) => Arc::new(reference),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load reference data, starting empty");
                Arc::new(ReferenceData::empty())
            }
        };

    let store = Arc::new(SummaryStore::new());

    // Push path
    let (feed_error_tx, feed_error_rx) = mpsc::channel::<FeedError>(FEED_ERROR_BUFFER);
    let stream_client = HitBtcStreamClient::new(
        StreamClientConfig::from_settings(&config.exchange, &config.feed),
        feed_error_tx,
    );
    let coordinator = Arc::new(FeedCoordinator::new(
        Arc::new(stream_client.clone()),
        Arc::clone(&store),
        Arc::clone(&reference),
        &shutdown_token,
    ));

    tokio::spawn(handle_feed_errors(feed_error_rx));

    // HTTP
    let service = Arc::new(SummaryService::new(
        rest_client,
        Arc::clone(&store),
        Arc::clone(&reference),
    ));
    let api_state = Arc::new(ApiState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        service,
        Arc::clone(&coordinator),
        stream_client.health(),
    ));
    let api_server = ApiServer::new(config.server.http_port, api_state, shutdown_token.clone());

    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Push path runs alongside; lookups are served while it connects.
    let supervisor = tokio::spawn(supervise_feed(
        stream_client.clone(),
        Arc::clone(&coordinator),
        BackoffConfig::for_feed(&config.feed),
        shutdown_token.clone(),
    ));

    tracing::info!("Summary cache ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        coordinator.shutdown().await;
        let leftover = stream_client.subscribed_count();
        if leftover > 0 {
            tracing::warn!(channels = leftover, "Ticker channels still open after shutdown");
        }
        stream_client.close().await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Graceful shutdown timed out"
        );
    }
    supervisor.abort();

    tracing::info!("Summary cache stopped");
    Ok(())
}

/// Log side-channel errors from the ticker stream.
async fn handle_feed_errors(mut rx: mpsc::Receiver<FeedError>) {
    while let Some(error) = rx.recv().await {
        match error {
            FeedError::Decode(message) => {
                tracing::warn!(error = %message, "Undecodable ticker frame");
            }
            other => tracing::error!(error = %other, "Ticker feed error"),
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        supported_symbols = config.supported_symbols.len(),
        channel_capacity = config.feed.channel_capacity,
        "Configuration loaded"
    );
    tracing::debug!(
        rest_url = %config.exchange.rest_url,
        ws_url = %config.exchange.ws_url,
        "Exchange endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
