//! Quote Source Port (Driven Port)
//!
//! Synchronous pull interface to the remote quote endpoint: one ticker per
//! call, plus the two listings reference data is built from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::summary::RawQuote;

/// One entry of the exchange's symbol listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolListing {
    /// Symbol identifier (e.g. `ETHBTC`).
    pub id: String,
    /// Currency fees are charged in.
    pub fee_currency: String,
}

/// One entry of the exchange's currency listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyListing {
    /// Currency code (e.g. `BTC`).
    pub id: String,
    /// Human-readable name.
    pub full_name: String,
}

/// Quote source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteSourceError {
    /// Transport failure (connect, timeout, body read).
    #[error("quote source network error: {0}")]
    Network(String),

    /// The endpoint answered with an error payload.
    #[error("quote source API error {code}: {message}")]
    Api {
        /// Error code reported by the endpoint (or the HTTP status).
        code: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the endpoint.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Transient failures persisted past the retry budget.
    #[error("gave up after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Attempts made.
        attempts: u32,
        /// Failure seen on the final attempt.
        last_error: String,
    },

    /// Response body could not be decoded.
    #[error("invalid quote source response: {0}")]
    InvalidResponse(String),
}

/// Port for pulling quotes and listings from the exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSourcePort: Send + Sync {
    /// Fetch the current ticker for one symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, QuoteSourceError>;

    /// Fetch the full symbol listing.
    async fn list_symbols(&self) -> Result<Vec<SymbolListing>, QuoteSourceError>;

    /// Fetch the full currency listing.
    async fn list_currencies(&self) -> Result<Vec<CurrencyListing>, QuoteSourceError>;
}
