//! HitBTC Ticker Stream Client
//!
//! [`TickerFeedPort`] over the HitBTC WebSocket API (JSON-RPC 2.0).
//!
//! # Connection model
//!
//! One background task owns the socket. Requests reach it through an
//! outbound channel and are matched to their answers by id. Ticker
//! notifications are routed to one bounded channel per subscribed symbol;
//! when a channel is full the update is dropped and counted.
//!
//! When the socket goes away every subscriber channel is closed and every
//! in-flight request fails with [`FeedError::NotConnected`]. Reconnecting
//! is left to the caller (see [`FeedHealth::wait_until_down`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{FeedError, TickerFeedPort};
use crate::domain::summary::{Symbol, TickerUpdate};
use crate::infrastructure::config::{ExchangeSettings, FeedSettings};
use crate::infrastructure::hitbtc::backoff::{BackoffConfig, BackoffPolicy};
use crate::infrastructure::hitbtc::codec::{Inbound, RpcCodec};
use crate::infrastructure::hitbtc::health::{ConnectionState, FeedHealth};
use crate::infrastructure::hitbtc::messages::methods;
use crate::infrastructure::metrics;

/// Frames queued for the socket writer.
const OUTBOUND_BUFFER: usize = 64;

// =============================================================================
// Configuration & Errors
// =============================================================================

/// Stream client settings.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// WebSocket URL.
    pub url: String,
    /// Buffered updates per symbol.
    pub channel_capacity: usize,
    /// How long to wait for a request's answer.
    pub rpc_timeout: Duration,
    /// Connect retry schedule.
    pub backoff: BackoffConfig,
}

impl StreamClientConfig {
    /// Build from service settings.
    #[must_use]
    pub fn from_settings(exchange: &ExchangeSettings, feed: &FeedSettings) -> Self {
        Self {
            url: exchange.ws_url.clone(),
            channel_capacity: feed.channel_capacity.max(1),
            rpc_timeout: feed.rpc_timeout,
            backoff: BackoffConfig::for_feed(feed),
        }
    }
}

/// Errors from connection management.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Every connect attempt failed.
    #[error("gave up connecting after {0} attempts")]
    MaxConnectAttemptsExceeded(u32),

    /// The client has been closed.
    #[error("stream client closed")]
    Closed,
}

// =============================================================================
// Client
// =============================================================================

type Reply = Result<Value, FeedError>;

#[derive(Debug)]
struct Inner {
    config: StreamClientConfig,
    codec: RpcCodec,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    pending: Mutex<HashMap<String, oneshot::Sender<Reply>>>,
    tickers: Mutex<HashMap<Symbol, mpsc::Sender<TickerUpdate>>>,
    errors: mpsc::Sender<FeedError>,
    health: Arc<FeedHealth>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// HitBTC WebSocket ticker client.
///
/// Cheap to clone; clones share the connection.
#[derive(Debug, Clone)]
pub struct HitBtcStreamClient {
    inner: Arc<Inner>,
}

impl HitBtcStreamClient {
    /// Create a disconnected client.
    ///
    /// Undecodable frames are reported on `errors`.
    #[must_use]
    pub fn new(config: StreamClientConfig, errors: mpsc::Sender<FeedError>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                codec: RpcCodec::new(),
                outbound: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                tickers: Mutex::new(HashMap::new()),
                errors,
                health: Arc::new(FeedHealth::new()),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Connection health shared with the health endpoints.
    #[must_use]
    pub fn health(&self) -> Arc<FeedHealth> {
        Arc::clone(&self.inner.health)
    }

    /// Open the connection, retrying with backoff.
    ///
    /// Returns immediately if already connected.
    ///
    /// # Errors
    ///
    /// Returns [`StreamClientError::MaxConnectAttemptsExceeded`] when the
    /// retry schedule runs out, or [`StreamClientError::Closed`] if the
    /// client is closed meanwhile.
    pub async fn connect(&self) -> Result<(), StreamClientError> {
        let inner = &self.inner;
        if inner.outbound.lock().is_some() {
            return Ok(());
        }

        let mut policy = BackoffPolicy::new(inner.config.backoff.clone());

        loop {
            if inner.cancel.is_cancelled() {
                inner.health.set_state(ConnectionState::Closed);
                return Err(StreamClientError::Closed);
            }

            inner.health.set_state(ConnectionState::Connecting);
            inner.health.increment_connect_attempts();
            metrics::record_connect_attempt();
            tracing::info!(url = %inner.config.url, "Connecting to ticker stream");

            match tokio_tungstenite::connect_async(inner.config.url.as_str()).await {
                Ok((ws, _response)) => {
                    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
                    *inner.outbound.lock() = Some(tx);
                    inner.health.set_state(ConnectionState::Connected);

                    let handle = tokio::spawn(run_connection(Arc::clone(inner), ws, rx));
                    *inner.task.lock() = Some(handle);

                    tracing::info!("Ticker stream connected");
                    return Ok(());
                }
                Err(e) => {
                    inner.health.set_error(e.to_string());
                    let Some(delay) = policy.next_delay() else {
                        inner.health.set_state(ConnectionState::Disconnected);
                        tracing::error!(error = %e, "Ticker stream connect failed, giving up");
                        return Err(StreamClientError::MaxConnectAttemptsExceeded(
                            policy.attempt_count() + 1,
                        ));
                    };
                    tracing::warn!(
                        error = %e,
                        delay_ms = delay.as_millis(),
                        attempt = policy.attempt_count(),
                        "Ticker stream connect failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = inner.cancel.cancelled() => {}
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Close the connection and stop accepting requests.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.inner.teardown();
    }

    /// Symbols with an open subscriber channel.
    #[must_use]
    pub fn subscribed_count(&self) -> usize {
        self.inner.tickers.lock().len()
    }
}

#[async_trait]
impl TickerFeedPort for HitBtcStreamClient {
    async fn subscribe(&self, symbol: &str) -> Result<mpsc::Receiver<TickerUpdate>, FeedError> {
        let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity);

        // Registered before the request so the first notification has a home.
        if self
            .inner
            .tickers
            .lock()
            .insert(symbol.to_string(), tx.clone())
            .is_some()
        {
            tracing::debug!(symbol, "Replacing existing ticker channel");
        }

        let result = self
            .inner
            .call(methods::SUBSCRIBE_TICKER, symbol)
            .await
            .and_then(|v| acknowledged(methods::SUBSCRIBE_TICKER, &v));

        match result {
            Ok(()) => {
                tracing::debug!(symbol, "Ticker subscription confirmed");
                Ok(rx)
            }
            Err(e) => {
                self.inner.remove_ticker(symbol, &tx);
                Err(FeedError::SubscriptionFailed {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn unsubscribe(&self, symbol: &str) -> Result<(), FeedError> {
        // Dropping the sender closes the subscriber's channel.
        drop(self.inner.tickers.lock().remove(symbol));

        self.inner
            .call(methods::UNSUBSCRIBE_TICKER, symbol)
            .await
            .and_then(|v| acknowledged(methods::UNSUBSCRIBE_TICKER, &v))
    }
}

impl Inner {
    /// Send one request and wait for its answer.
    async fn call(&self, method: &str, symbol: &str) -> Reply {
        let id = Uuid::new_v4().to_string();
        let frame = self
            .codec
            .encode_request(method, symbol, &id)
            .map_err(|e| FeedError::Decode(e.to_string()))?;

        let Some(outbound) = self.outbound.lock().clone() else {
            return Err(FeedError::NotConnected);
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);

        if outbound.send(Message::Text(frame.into())).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(FeedError::NotConnected);
        }

        match tokio::time::timeout(self.config.rpc_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            // Waiter dropped by teardown.
            Ok(Err(_)) => Err(FeedError::NotConnected),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(FeedError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(Inbound::Ticker(update)) => {
                self.health.increment_messages();
                self.route(update);
            }
            Ok(Inbound::Response { id, outcome }) => {
                let waiter = self.pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(outcome.map_err(|e| FeedError::Rpc {
                            code: e.code,
                            message: e.message,
                        }));
                    }
                    None => tracing::debug!(id, "Response for unknown request"),
                }
            }
            Ok(Inbound::Notification { method }) => {
                tracing::trace!(method, "Ignoring notification");
            }
            Err(e) => {
                self.health.increment_decode_errors();
                metrics::record_decode_error();
                if self.errors.try_send(FeedError::Decode(e.to_string())).is_err() {
                    tracing::debug!(error = %e, "Feed error channel unavailable, dropping decode error");
                }
            }
        }
    }

    fn route(&self, update: TickerUpdate) {
        let sender = self.tickers.lock().get(&update.symbol).cloned();
        let Some(sender) = sender else {
            tracing::trace!(symbol = %update.symbol, "Ticker for unsubscribed symbol");
            return;
        };

        match sender.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                self.health.increment_dropped();
                metrics::record_feed_update_dropped();
                tracing::debug!(symbol = %update.symbol, "Subscriber lagging, update dropped");
            }
            Err(TrySendError::Closed(update)) => {
                self.remove_ticker(&update.symbol, &sender);
            }
        }
    }

    /// Remove `symbol`'s channel only if it is still `sender`'s.
    fn remove_ticker(&self, symbol: &str, sender: &mpsc::Sender<TickerUpdate>) {
        let mut tickers = self.tickers.lock();
        if tickers.get(symbol).is_some_and(|s| s.same_channel(sender)) {
            tickers.remove(symbol);
        }
    }

    fn teardown(&self) {
        self.outbound.lock().take();
        let closed = {
            let mut tickers = self.tickers.lock();
            let n = tickers.len();
            tickers.clear();
            n
        };
        self.pending.lock().clear();

        let state = if self.cancel.is_cancelled() {
            ConnectionState::Closed
        } else {
            ConnectionState::Disconnected
        };
        if self.health.state() != state {
            tracing::info!(
                state = state.as_str(),
                closed_channels = closed,
                "Ticker stream down"
            );
        }
        self.health.set_state(state);
    }
}

fn acknowledged(method: &str, result: &Value) -> Result<(), FeedError> {
    if result.as_bool() == Some(true) {
        Ok(())
    } else {
        Err(FeedError::Rpc {
            code: 0,
            message: format!("{method} not acknowledged: {result}"),
        })
    }
}

async fn run_connection<S>(
    inner: Arc<Inner>,
    ws: WebSocketStream<S>,
    mut outbound: mpsc::Receiver<Message>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write.send(frame).await {
                    tracing::warn!(error = %e, "Ticker stream write failed");
                    break;
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => inner.handle_text(&text),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            tracing::warn!(error = %e, "Ticker stream write failed");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server sent close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Ticker stream read failed");
                        break;
                    }
                    None => {
                        tracing::info!("Ticker stream ended");
                        break;
                    }
                }
            }
        }
    }

    inner.teardown();
}

// =============================================================================
// Tests
// =============================================================================
