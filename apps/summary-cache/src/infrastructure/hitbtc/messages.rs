//! HitBTC Wire Types
//!
//! REST response bodies for the public API v2 and JSON-RPC 2.0 frames for
//! the WebSocket API. Unknown fields are ignored everywhere.
//!
//! # REST
//!
//! - `GET /public/ticker/{SYMBOL}` → [`TickerResponse`]
//! - `GET /public/symbol` → `[SymbolResponse]`
//! - `GET /public/currency` → `[CurrencyResponse]`
//! - errors → [`ApiErrorResponse`]
//!
//! # WebSocket
//!
//! ```json
//! {"method":"subscribeTicker","params":{"symbol":"ETHBTC"},"id":"…"}
//! {"jsonrpc":"2.0","result":true,"id":"…"}
//! {"jsonrpc":"2.0","method":"ticker","params":{"ask":"0.054464","symbol":"ETHBTC",…}}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{CurrencyListing, SymbolListing};
use crate::domain::summary::RawQuote;

// =============================================================================
// REST
// =============================================================================

/// Ticker snapshot from `GET /public/ticker/{symbol}`.
///
/// Numbers arrive as strings; `null` means no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerResponse {
    /// Trading pair.
    pub symbol: String,
    /// Best ask.
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Best bid.
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Last trade price.
    #[serde(default)]
    pub last: Option<Decimal>,
    /// Open price.
    #[serde(default)]
    pub open: Option<Decimal>,
    /// 24h low.
    #[serde(default)]
    pub low: Option<Decimal>,
    /// 24h high.
    #[serde(default)]
    pub high: Option<Decimal>,
    /// 24h base volume.
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// 24h quote volume.
    #[serde(default)]
    pub volume_quote: Option<Decimal>,
    /// Last update time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<TickerResponse> for RawQuote {
    fn from(t: TickerResponse) -> Self {
        Self {
            symbol: t.symbol,
            ask: t.ask.unwrap_or_default(),
            bid: t.bid.unwrap_or_default(),
            last: t.last.unwrap_or_default(),
            open: t.open.unwrap_or_default(),
            low: t.low.unwrap_or_default(),
            high: t.high.unwrap_or_default(),
            volume: t.volume.unwrap_or_default(),
            volume_quote: t.volume_quote.unwrap_or_default(),
            timestamp: t.timestamp,
        }
    }
}

/// Entry of `GET /public/symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolResponse {
    /// Symbol id.
    pub id: String,
    /// Base currency.
    #[serde(default)]
    pub base_currency: String,
    /// Quote currency.
    #[serde(default)]
    pub quote_currency: String,
    /// Fee currency.
    #[serde(default)]
    pub fee_currency: String,
}

impl From<SymbolResponse> for SymbolListing {
    fn from(s: SymbolResponse) -> Self {
        Self {
            id: s.id,
            fee_currency: s.fee_currency,
        }
    }
}

/// Entry of `GET /public/currency`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyResponse {
    /// Currency code.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub full_name: String,
    /// Whether the currency is delisted.
    #[serde(default)]
    pub delisted: bool,
}

impl From<CurrencyResponse> for CurrencyListing {
    fn from(c: CurrencyResponse) -> Self {
        Self {
            id: c.id,
            full_name: c.full_name,
        }
    }
}

/// Error envelope returned by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    /// Numeric error code.
    #[serde(default)]
    pub code: i64,
    /// Short message.
    #[serde(default)]
    pub message: String,
    /// Longer description, when present.
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// WebSocket JSON-RPC
// =============================================================================

/// Outgoing JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    /// Method name.
    pub method: &'a str,
    /// Method parameters.
    pub params: SymbolParams<'a>,
    /// Correlation id.
    pub id: &'a str,
}

/// `{"symbol": …}` parameter object.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolParams<'a> {
    /// Trading pair.
    pub symbol: &'a str,
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcErrorBody {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Subscription management methods.
pub mod methods {
    /// Subscribe to ticker notifications.
    pub const SUBSCRIBE_TICKER: &str = "subscribeTicker";
    /// Unsubscribe from ticker notifications.
    pub const UNSUBSCRIBE_TICKER: &str = "unsubscribeTicker";
    /// Ticker notification.
    pub const TICKER: &str = "ticker";
}
