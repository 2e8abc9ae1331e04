//! Ticker Stream Supervisor
//!
//! Owns the push path's connection lifecycle. The first connect happens
//! here too, so callers can start serving lookups without waiting on the
//! exchange.
//!
//! ```text
//! connect ──ok──► coordinator.start ──► wait until down ──┐
//!    ▲  └──err──────────────────────────────────────────┐ │
//!    └──────────────── pause (backoff, reset on ok) ◄───┴─┘
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::backoff::{BackoffConfig, BackoffPolicy};
use super::stream::{HitBtcStreamClient, StreamClientError};
use crate::application::services::{FeedCoordinator, StartReport};

/// Connect the ticker stream, subscribe the supported set, and repeat both
/// whenever the connection drops.
///
/// Pauses between outages follow `outage_backoff` without an attempt limit
/// and restart from the initial delay after every successful connect.
/// Returns once `cancel` fires or the client is closed.
pub async fn supervise_feed(
    client: HitBtcStreamClient,
    coordinator: Arc<FeedCoordinator>,
    outage_backoff: BackoffConfig,
    cancel: CancellationToken,
) {
    let health = client.health();
    let max_pause = outage_backoff.max_delay;
    let mut outages = BackoffPolicy::new(BackoffConfig {
        max_attempts: 0,
        ..outage_backoff
    });

    loop {
        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = client.connect() => result,
        };

        match connected {
            Ok(()) => {
                outages.reset();
                log_start_report(&coordinator.start().await);

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    () = health.wait_until_down() => {}
                }
                tracing::warn!("Ticker stream down");
            }
            Err(StreamClientError::Closed) => return,
            Err(e) => {
                tracing::error!(error = %e, "Ticker stream unavailable, serving lookups only");
            }
        }

        let pause = outages.next_delay().unwrap_or(max_pause);
        tracing::info!(pause_ms = pause.as_millis(), "Reconnecting ticker stream");

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(pause) => {}
        }
    }
}

fn log_start_report(report: &StartReport) {
    for (symbol, error) in &report.failed {
        tracing::warn!(symbol = %symbol, error = %error, "Subscription failed");
    }
}
