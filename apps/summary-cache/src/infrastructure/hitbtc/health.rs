//! Feed Connection Health
//!
//! Shared view of the ticker stream connection, read by the health
//! endpoints and the reconnect supervisor.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Ticker stream connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection; a connect may be attempted.
    Disconnected,
    /// A connect is in progress.
    Connecting,
    /// Connected and serving requests.
    Connected,
    /// Shut down; no further connects.
    Closed,
}

impl ConnectionState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

/// Counters and state for one feed connection.
#[derive(Debug)]
pub struct FeedHealth {
    state: watch::Sender<ConnectionState>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    error_message: parking_lot::RwLock<Option<String>>,
    connect_attempts: AtomicU32,
    messages_received: AtomicU64,
    updates_dropped: AtomicU64,
    decode_errors: AtomicU64,
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedHealth {
    /// Create a health record in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(ConnectionState::Disconnected),
            last_connected_at: parking_lot::RwLock::new(None),
            error_message: parking_lot::RwLock::new(None),
            connect_attempts: AtomicU32::new(0),
            messages_received: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
        }
    }

    /// Set the connection state.
    ///
    /// `Connected` clears the last error and the attempt counter.
    pub fn set_state(&self, state: ConnectionState) {
        if state == ConnectionState::Connected {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.error_message.write() = None;
            self.connect_attempts.store(0, Ordering::Relaxed);
        }
        self.state.send_replace(state);
    }

    /// Record the most recent connection error.
    pub fn set_error(&self, message: String) {
        *self.error_message.write() = Some(message);
    }

    /// Count a connect attempt.
    pub fn increment_connect_attempts(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a received ticker notification.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an update dropped on a full channel.
    pub fn increment_dropped(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an undecodable frame.
    pub fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Wait until the connection is not `Connected`.
    ///
    /// Returns immediately if it already is not.
    pub async fn wait_until_down(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| *s != ConnectionState::Connected).await;
    }

    /// Time of the last successful connect.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Last recorded connection error.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error_message.read().clone()
    }

    /// Connect attempts since the last successful connect.
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Ticker notifications received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Updates dropped on full channels.
    #[must_use]
    pub fn updates_dropped(&self) -> u64 {
        self.updates_dropped.load(Ordering::Relaxed)
    }

    /// Undecodable frames.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }
}
