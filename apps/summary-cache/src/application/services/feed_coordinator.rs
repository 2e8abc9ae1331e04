//! Feed Coordinator
//!
//! Supervises one listener task per subscribed symbol. Each listener drains
//! its channel, converts and enriches every update, and writes it into the
//! shared store when the symbol is supported.
//!
//! # Lifecycle
//!
//! ```text
//! Unsubscribed ──subscribe──► Subscribing ──ok──► Active ──unsubscribe──► Closing ──► Unsubscribed
//!                                  │                 │
//!                                  └──err──► Unsubscribed   └──transport closed──► Unsubscribed
//! ```
//!
//! # Cancellation
//!
//! A root [`CancellationToken`] owns one child token per symbol. A listener
//! selects over its token and its channel with the token polled first, and
//! re-checks the token right before each store write. `unsubscribe` and
//! `shutdown` wait for the listener to exit, so once they return no further
//! push write happens for that symbol.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedError, TickerFeedPort};
use crate::domain::reference::ReferenceData;
use crate::domain::store::SummaryStore;
use crate::domain::summary::{Conversion, Symbol, TickerUpdate};
use crate::infrastructure::metrics;

// =============================================================================
// Types
// =============================================================================

/// Per-symbol subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No subscription and no listener.
    Unsubscribed,
    /// Transport subscribe in flight.
    Subscribing,
    /// Listener running.
    Active,
    /// Listener being torn down.
    Closing,
}

/// Outcome of [`FeedCoordinator::start`].
#[derive(Debug, Default)]
pub struct StartReport {
    /// Symbols that are now active.
    pub active: Vec<Symbol>,
    /// Symbols whose subscribe failed, with the reason.
    pub failed: Vec<(Symbol, FeedError)>,
}

struct Slot {
    state: SubscriptionState,
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    feed: Arc<dyn TickerFeedPort>,
    store: Arc<SummaryStore>,
    reference: Arc<ReferenceData>,
    slots: Mutex<HashMap<Symbol, Slot>>,
}

impl Shared {
    /// Remove the slot for `symbol` only if it still belongs to `generation`.
    fn release(&self, symbol: &str, generation: u64) {
        let mut slots = self.slots.lock();
        if slots.get(symbol).is_some_and(|s| s.generation == generation) {
            slots.remove(symbol);
        }
        let active = count_active(&slots);
        drop(slots);
        metrics::set_active_subscriptions(active);
    }
}

fn count_active(slots: &HashMap<Symbol, Slot>) -> usize {
    slots
        .values()
        .filter(|s| s.state == SubscriptionState::Active)
        .count()
}

// =============================================================================
// Coordinator
// =============================================================================

/// Owns the push-path listeners for every subscribed symbol.
pub struct FeedCoordinator {
    shared: Arc<Shared>,
    root: CancellationToken,
    generation: AtomicU64,
}

impl FeedCoordinator {
    /// Create a coordinator. Listeners are children of `shutdown`.
    #[must_use]
    pub fn new(
        feed: Arc<dyn TickerFeedPort>,
        store: Arc<SummaryStore>,
        reference: Arc<ReferenceData>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                feed,
                store,
                reference,
                slots: Mutex::new(HashMap::new()),
            }),
            root: shutdown.child_token(),
            generation: AtomicU64::new(0),
        }
    }

    /// Subscribe every supported symbol.
    ///
    /// Failures are collected per symbol and never stop the others.
    pub async fn start(&self) -> StartReport {
        let symbols = self.shared.reference.supported_symbols().to_vec();
        tracing::info!(count = symbols.len(), "Subscribing supported symbols");

        let results = join_all(symbols.iter().map(|symbol| self.subscribe(symbol))).await;

        let mut report = StartReport::default();
        for (symbol, result) in symbols.into_iter().zip(results) {
            match result {
                Ok(()) => report.active.push(symbol),
                Err(e) => report.failed.push((symbol, e)),
            }
        }

        tracing::info!(
            active = report.active.len(),
            failed = report.failed.len(),
            "Feed coordinator started"
        );
        report
    }

    /// Subscribe one symbol and start its listener.
    ///
    /// A symbol that is already subscribing or active is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SubscriptionFailed`] if the transport rejects the
    /// subscription, if the symbol is mid-teardown, or if the coordinator
    /// has shut down.
    pub async fn subscribe(&self, symbol: &str) -> Result<(), FeedError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();

        {
            let mut slots = self.shared.slots.lock();
            if self.root.is_cancelled() {
                return Err(subscription_failed(symbol, "coordinator shut down"));
            }
            match slots.get(symbol).map(|s| s.state) {
                Some(SubscriptionState::Subscribing | SubscriptionState::Active) => {
                    tracing::debug!(symbol, "Already subscribed");
                    return Ok(());
                }
                Some(SubscriptionState::Closing) => {
                    return Err(subscription_failed(symbol, "unsubscribe in progress"));
                }
                Some(SubscriptionState::Unsubscribed) | None => {}
            }
            slots.insert(
                symbol.to_string(),
                Slot {
                    state: SubscriptionState::Subscribing,
                    generation,
                    cancel: cancel.clone(),
                    handle: None,
                },
            );
        }

        let rx = match self.shared.feed.subscribe(symbol).await {
            Ok(rx) => rx,
            Err(e) => {
                self.shared.release(symbol, generation);
                metrics::record_subscription_failure();
                tracing::warn!(symbol, error = %e, "Subscribe failed");
                return Err(match e {
                    FeedError::SubscriptionFailed { .. } => e,
                    other => subscription_failed(symbol, &other.to_string()),
                });
            }
        };

        let started = {
            let mut slots = self.shared.slots.lock();
            let live = !cancel.is_cancelled()
                && slots.get(symbol).is_some_and(|s| s.generation == generation);
            if live {
                let handle = tokio::spawn(listen(
                    Arc::clone(&self.shared),
                    symbol.to_string(),
                    generation,
                    rx,
                    cancel.clone(),
                ));
                if let Some(slot) = slots.get_mut(symbol) {
                    slot.state = SubscriptionState::Active;
                    slot.handle = Some(handle);
                }
                metrics::set_active_subscriptions(count_active(&slots));
            } else {
                drop(rx);
            }
            live
        };

        if started {
            tracing::info!(symbol, "Subscribed");
            return Ok(());
        }

        // Cancelled while the transport subscribe was in flight.
        if let Err(e) = self.shared.feed.unsubscribe(symbol).await {
            tracing::warn!(symbol, error = %e, "Unsubscribe after cancelled subscribe failed");
        }
        self.shared.release(symbol, generation);
        Err(subscription_failed(symbol, "cancelled while subscribing"))
    }

    /// Stop the listener for `symbol` and wait for it to exit.
    ///
    /// No-op when the symbol has no subscription.
    pub async fn unsubscribe(&self, symbol: &str) {
        let (generation, handle) = {
            let mut slots = self.shared.slots.lock();
            let Some(slot) = slots.get_mut(symbol) else {
                return;
            };
            if slot.state == SubscriptionState::Closing {
                return;
            }
            slot.state = SubscriptionState::Closing;
            slot.cancel.cancel();
            (slot.generation, slot.handle.take())
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(symbol, error = %e, "Feed listener panicked");
            }
            self.shared.release(symbol, generation);
        }
        // Without a handle the subscribe call still owns the slot and
        // releases it once it observes the cancellation.

        tracing::info!(symbol, "Unsubscribed");
    }

    /// Cancel every listener and wait for all of them. Idempotent.
    pub async fn shutdown(&self) {
        self.root.cancel();

        let handles: Vec<(Symbol, JoinHandle<()>)> = {
            let mut slots = self.shared.slots.lock();
            slots
                .iter_mut()
                .filter_map(|(symbol, slot)| {
                    slot.state = SubscriptionState::Closing;
                    slot.handle.take().map(|h| (symbol.clone(), h))
                })
                .collect()
        };

        if handles.is_empty() {
            return;
        }

        tracing::info!(listeners = handles.len(), "Stopping feed listeners");

        for (symbol, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(symbol = %symbol, error = %e, "Feed listener panicked");
            }
        }

        let mut slots = self.shared.slots.lock();
        slots.retain(|_, slot| slot.handle.is_some());
        drop(slots);
        metrics::set_active_subscriptions(0);

        tracing::info!("Feed coordinator stopped");
    }

    /// Current state for `symbol`.
    #[must_use]
    pub fn state(&self, symbol: &str) -> SubscriptionState {
        self.shared
            .slots
            .lock()
            .get(symbol)
            .map_or(SubscriptionState::Unsubscribed, |s| s.state)
    }

    /// Symbols with a running listener, sorted.
    #[must_use]
    pub fn active_symbols(&self) -> Vec<Symbol> {
        let mut active: Vec<Symbol> = self
            .shared
            .slots
            .lock()
            .iter()
            .filter(|(_, s)| s.state == SubscriptionState::Active)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        active.sort_unstable();
        active
    }

    /// Number of symbols with a running listener.
    #[must_use]
    pub fn active_count(&self) -> usize {
        count_active(&self.shared.slots.lock())
    }
}

fn subscription_failed(symbol: &str, reason: &str) -> FeedError {
    FeedError::SubscriptionFailed {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// Listener
// =============================================================================

async fn listen(
    shared: Arc<Shared>,
    symbol: Symbol,
    generation: u64,
    mut rx: mpsc::Receiver<TickerUpdate>,
    cancel: CancellationToken,
) {
    tracing::debug!(symbol = %symbol, "Feed listener started");

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                rx.close();
                if let Err(e) = shared.feed.unsubscribe(&symbol).await {
                    tracing::warn!(symbol = %symbol, error = %e, "Transport unsubscribe failed");
                }
                tracing::debug!(symbol = %symbol, "Feed listener cancelled");
                return;
            }

            update = rx.recv() => {
                let Some(update) = update else {
                    tracing::info!(symbol = %symbol, "Feed channel closed by transport");
                    shared.release(&symbol, generation);
                    return;
                };
                apply_update(&shared, &symbol, &update, &cancel);
            }
        }
    }
}

fn apply_update(shared: &Shared, symbol: &str, update: &TickerUpdate, cancel: &CancellationToken) {
    let Conversion { quote, failures } = update.convert();

    for failure in &failures {
        metrics::record_field_conversion_failure(failure.field);
        tracing::warn!(
            symbol,
            field = failure.field,
            raw = %failure.raw,
            "Unparsable ticker field, using zero"
        );
    }

    let record = shared.reference.enrich(symbol, quote);

    if cancel.is_cancelled() || !shared.reference.is_supported(symbol) {
        return;
    }

    shared.store.set(symbol, record);
    metrics::record_feed_update();
}

// =============================================================================
// Tests
// =============================================================================
