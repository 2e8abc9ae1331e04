//! Ticker Feed Port (Driven Port)
//!
//! Push subscription transport. A successful `subscribe` hands back a
//! channel that yields decoded updates for one symbol until either side
//! closes it:
//!
//! - `unsubscribe` closes it from our side
//! - a dropped connection closes it from the transport side
//!
//! Undecodable frames never reach the channel; transports report them as
//! [`FeedError::Decode`] on their own error channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::summary::TickerUpdate;

/// Feed transport error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The transport refused or failed to open a subscription.
    #[error("subscription to {symbol} failed: {reason}")]
    SubscriptionFailed {
        /// Symbol being subscribed.
        symbol: String,
        /// Why it failed.
        reason: String,
    },

    /// An incoming frame could not be decoded.
    #[error("failed to decode feed message: {0}")]
    Decode(String),

    /// The transport has no live connection.
    #[error("feed not connected")]
    NotConnected,

    /// The remote answered a request with an error.
    #[error("feed RPC error {code}: {message}")]
    Rpc {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// A request got no answer in time.
    #[error("feed request {method} timed out")]
    Timeout {
        /// RPC method name.
        method: String,
    },
}

/// Port for live per-symbol ticker subscriptions.
#[async_trait]
pub trait TickerFeedPort: Send + Sync {
    /// Open a push channel for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SubscriptionFailed`] when the transport rejects
    /// the subscription.
    async fn subscribe(&self, symbol: &str) -> Result<mpsc::Receiver<TickerUpdate>, FeedError>;

    /// Tear down the subscription for `symbol` and close its channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote unsubscribe fails. The local channel
    /// is closed regardless.
    async fn unsubscribe(&self, symbol: &str) -> Result<(), FeedError>;
}
