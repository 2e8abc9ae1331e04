//! Live Feed Integration Tests
//!
//! Runs the real WebSocket client and feed coordinator against a local fake
//! exchange, then reads the result back through the currency API router.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use summary_cache::infrastructure::hitbtc::{BackoffConfig, ConnectionState, supervise_feed};
use summary_cache::infrastructure::http::router;
use summary_cache::{
    ApiState, CurrencyListing, FeedCoordinator, HitBtcStreamClient, QuoteSourceError,
    QuoteSourcePort, RawQuote, ReferenceData, StreamClientConfig, SummaryService, SummaryStore,
    SymbolListing,
};

// =============================================================================
// Fake Exchange
// =============================================================================

struct FakeExchange {
    url: String,
    requests: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<Message>,
}

/// Accepts one connection, acknowledges every request with `true` and
/// forwards pushed frames.
async fn fake_exchange() -> FakeExchange {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (req_tx, requests) = mpsc::unbounded_channel();
    let (push, mut push_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                frame = push_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if write.send(frame).await.is_err() {
                        break;
                    }
                }
                msg = read.next() => {
                    let Some(Ok(Message::Text(text))) = msg else { break };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let reply = json!({"jsonrpc": "2.0", "result": true, "id": request["id"]});
                    let _ = req_tx.send(request);
                    if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    FakeExchange {
        url,
        requests,
        push,
    }
}

fn ticker_frame(symbol: &str, last: &str) -> Message {
    let frame = json!({
        "jsonrpc": "2.0",
        "method": "ticker",
        "params": {
            "ask": "0.0351",
            "bid": "0.0349",
            "last": last,
            "open": "0.034",
            "low": "0.0338",
            "high": "0.0355",
            "volume": "120.5",
            "volumeQuote": "4.21",
            "timestamp": "2026-10-18T12:00:00.000Z",
            "symbol": symbol
        }
    });
    Message::Text(frame.to_string().into())
}

// =============================================================================
// Helpers
// =============================================================================

/// Quote source for the pull path; every fetch fails so lookups never
/// mask what the feed wrote.
struct UnreachableSource;

#[async_trait]
impl QuoteSourcePort for UnreachableSource {
    async fn fetch_quote(&self, _symbol: &str) -> Result<RawQuote, QuoteSourceError> {
        Err(QuoteSourceError::Network("unreachable".to_string()))
    }

    async fn list_symbols(&self) -> Result<Vec<SymbolListing>, QuoteSourceError> {
        Ok(Vec::new())
    }

    async fn list_currencies(&self) -> Result<Vec<CurrencyListing>, QuoteSourceError> {
        Ok(Vec::new())
    }
}

struct Harness {
    exchange: FakeExchange,
    client: HitBtcStreamClient,
    store: Arc<SummaryStore>,
    reference: Arc<ReferenceData>,
    coordinator: Arc<FeedCoordinator>,
}

fn fast_backoff(max_attempts: u32) -> BackoffConfig {
    BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
        jitter_factor: 0.0,
        max_attempts,
        ..BackoffConfig::default()
    }
}

fn stream_client(url: &str, max_attempts: u32) -> HitBtcStreamClient {
    let (err_tx, _err_rx) = mpsc::channel(16);
    HitBtcStreamClient::new(
        StreamClientConfig {
            url: url.to_string(),
            channel_capacity: 16,
            rpc_timeout: Duration::from_secs(2),
            backoff: fast_backoff(max_attempts),
        },
        err_tx,
    )
}

fn reference() -> Arc<ReferenceData> {
    Arc::new(
        ReferenceData::builder()
            .listed("ETHBTC", "BTC")
            .listed("XRPBTC", "BTC")
            .currency("BTC", "Bitcoin")
            .allowlist(vec!["ETHBTC".to_string()])
            .build(),
    )
}

async fn harness() -> Harness {
    let exchange = fake_exchange().await;
    let client = stream_client(&exchange.url, 2);
    client.connect().await.unwrap();

    let reference = reference();
    let store = Arc::new(SummaryStore::new());
    let coordinator = Arc::new(FeedCoordinator::new(
        Arc::new(client.clone()),
        Arc::clone(&store),
        Arc::clone(&reference),
        &CancellationToken::new(),
    ));

    Harness {
        exchange,
        client,
        store,
        reference,
        coordinator,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn pushed_ticker_is_stored_enriched() {
    let mut h = harness().await;

    let report = h.coordinator.start().await;
    assert_eq!(report.active, vec!["ETHBTC".to_string()]);
    let request = h.exchange.requests.recv().await.unwrap();
    assert_eq!(request["method"], "subscribeTicker");
    assert_eq!(request["params"]["symbol"], "ETHBTC");

    h.exchange.push.send(ticker_frame("ETHBTC", "0.035")).unwrap();
    let store = Arc::clone(&h.store);
    wait_until(|| store.contains("ETHBTC")).await;

    let record = h.store.get("ETHBTC").unwrap();
    assert_eq!(record.id, "ETHBTC");
    assert_eq!(record.full_name, "Bitcoin");
    assert_eq!(record.fee_currency, "BTC");
    assert_eq!(record.last.to_string(), "0.035");
    assert!(record.timestamp.is_some());

    h.coordinator.shutdown().await;
    h.client.close().await;
}

#[tokio::test]
async fn ticker_for_unsubscribed_symbol_is_ignored() {
    let h = harness().await;
    h.coordinator.start().await;

    h.exchange.push.send(ticker_frame("XRPBTC", "0.00001")).unwrap();
    h.exchange.push.send(ticker_frame("ETHBTC", "0.035")).unwrap();
    let store = Arc::clone(&h.store);
    wait_until(|| store.contains("ETHBTC")).await;

    assert!(!h.store.contains("XRPBTC"));
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.client.health().messages_received(), 2);

    h.coordinator.shutdown().await;
    h.client.close().await;
}

#[tokio::test]
async fn undecodable_frame_does_not_end_subscription() {
    let h = harness().await;
    h.coordinator.start().await;

    h.exchange
        .push
        .send(Message::Text("{not json".to_string().into()))
        .unwrap();
    h.exchange.push.send(ticker_frame("ETHBTC", "0.035")).unwrap();
    let store = Arc::clone(&h.store);
    wait_until(|| store.contains("ETHBTC")).await;

    assert_eq!(h.client.health().decode_errors(), 1);
    assert_eq!(h.coordinator.active_symbols(), vec!["ETHBTC".to_string()]);

    h.coordinator.shutdown().await;
    h.client.close().await;
}

#[tokio::test]
async fn shutdown_unsubscribes_from_exchange() {
    let mut h = harness().await;
    h.coordinator.start().await;
    let _ = h.exchange.requests.recv().await.unwrap();

    h.coordinator.shutdown().await;

    let request = tokio::time::timeout(Duration::from_secs(2), h.exchange.requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request["method"], "unsubscribeTicker");
    assert_eq!(request["params"]["symbol"], "ETHBTC");
    assert_eq!(h.coordinator.active_count(), 0);
    assert_eq!(h.client.subscribed_count(), 0);

    h.client.close().await;
}

#[tokio::test]
async fn currency_api_serves_pushed_summary() {
    let h = harness().await;
    h.coordinator.start().await;
    h.exchange.push.send(ticker_frame("ETHBTC", "0.035")).unwrap();
    let store = Arc::clone(&h.store);
    wait_until(|| store.contains("ETHBTC")).await;

    let service = Arc::new(SummaryService::new(
        Arc::new(UnreachableSource),
        Arc::clone(&h.store),
        Arc::clone(&h.reference),
    ));
    let state = Arc::new(ApiState::new(
        "test".to_string(),
        service,
        Arc::clone(&h.coordinator),
        h.client.health(),
    ));

    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/currency/all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let currencies = body["currencies"].as_array().unwrap();
    assert_eq!(currencies.len(), 1);
    assert_eq!(currencies[0]["symbol"], "ETHBTC");
    assert_eq!(currencies[0]["last"], "0.035");
    assert_eq!(currencies[0]["fullname"], "Bitcoin");
    assert_eq!(currencies[0]["feecurrency"], "BTC");

    h.coordinator.shutdown().await;
    h.client.close().await;
}

#[tokio::test]
async fn supervisor_connects_and_subscribes_in_background() {
    let mut exchange = fake_exchange().await;
    let client = stream_client(&exchange.url, 2);
    let store = Arc::new(SummaryStore::new());
    let coordinator = Arc::new(FeedCoordinator::new(
        Arc::new(client.clone()),
        Arc::clone(&store),
        reference(),
        &CancellationToken::new(),
    ));
    let cancel = CancellationToken::new();

    let supervisor = tokio::spawn(supervise_feed(
        client.clone(),
        Arc::clone(&coordinator),
        fast_backoff(0),
        cancel.clone(),
    ));

    let request = tokio::time::timeout(Duration::from_secs(2), exchange.requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request["method"], "subscribeTicker");
    wait_until(|| coordinator.active_count() == 1).await;

    exchange.push.send(ticker_frame("ETHBTC", "0.035")).unwrap();
    wait_until(|| store.contains("ETHBTC")).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), supervisor)
        .await
        .unwrap()
        .unwrap();
    coordinator.shutdown().await;
    client.close().await;
}

#[tokio::test]
async fn supervisor_keeps_retrying_until_shutdown_when_exchange_is_unreachable() {
    let client = stream_client("ws://127.0.0.1:1", 0);
    let coordinator = Arc::new(FeedCoordinator::new(
        Arc::new(client.clone()),
        Arc::new(SummaryStore::new()),
        reference(),
        &CancellationToken::new(),
    ));
    let cancel = CancellationToken::new();

    let supervisor = tokio::spawn(supervise_feed(
        client.clone(),
        Arc::clone(&coordinator),
        fast_backoff(0),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!supervisor.is_finished());
    assert_ne!(client.health().state(), ConnectionState::Connected);
    assert_eq!(coordinator.active_count(), 0);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), supervisor)
        .await
        .expect("supervisor ignored shutdown")
        .unwrap();
}
