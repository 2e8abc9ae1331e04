//! Market Summary Types
//!
//! The record served to readers, plus the two shapes data arrives in before
//! it becomes a record:
//!
//! - [`RawQuote`]: a decoded quote with numeric fields already converted
//!   (pull path, and the output of push conversion)
//! - [`TickerUpdate`]: a push notification whose numeric fields are still
//!   string-encoded
//!
//! Enrichment (fee currency, display name) happens in
//! [`crate::domain::reference::ReferenceData::enrich`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Types
// =============================================================================

/// A trading pair identifier such as `ETHBTC`.
pub type Symbol = String;

/// Latest market summary for one symbol.
///
/// Serialized with the exchange-facing field names used by the currency API.
/// Decimals serialize as strings; `low` and `high` are omitted when zero and
/// `timestamp` is omitted when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Duplicate of `symbol`.
    pub id: String,
    /// Display name of the fee currency.
    #[serde(rename = "fullname")]
    pub full_name: String,
    /// Best ask price.
    pub ask: Decimal,
    /// Best bid price.
    pub bid: Decimal,
    /// Last trade price.
    pub last: Decimal,
    /// Last trade price 24 hours ago.
    pub open: Decimal,
    /// Lowest trade price within 24 hours.
    #[serde(default, skip_serializing_if = "Decimal::is_zero")]
    pub low: Decimal,
    /// Highest trade price within 24 hours.
    #[serde(default, skip_serializing_if = "Decimal::is_zero")]
    pub high: Decimal,
    /// 24h volume in base currency.
    pub volume: Decimal,
    /// 24h volume in quote currency.
    #[serde(rename = "volumeQuote")]
    pub volume_quote: Decimal,
    /// Time of the last trade or refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Trading pair identifier (primary key).
    pub symbol: Symbol,
    /// Currency fees are charged in.
    #[serde(rename = "feecurrency")]
    pub fee_currency: String,
}

/// A quote with numeric fields in decimal form, before enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuote {
    /// Symbol as reported by the source.
    pub symbol: Symbol,
    /// Best ask price.
    pub ask: Decimal,
    /// Best bid price.
    pub bid: Decimal,
    /// Last trade price.
    pub last: Decimal,
    /// Open price.
    pub open: Decimal,
    /// 24h low.
    pub low: Decimal,
    /// 24h high.
    pub high: Decimal,
    /// 24h base volume.
    pub volume: Decimal,
    /// 24h quote volume.
    pub volume_quote: Decimal,
    /// Last trade or refresh time, if known.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A live ticker notification with string-encoded fields.
///
/// Any field may be missing; HitBTC sends `null` for an empty book side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerUpdate {
    /// Trading pair identifier.
    pub symbol: Symbol,
    /// Best ask price.
    #[serde(default)]
    pub ask: Option<String>,
    /// Best bid price.
    #[serde(default)]
    pub bid: Option<String>,
    /// Last trade price.
    #[serde(default)]
    pub last: Option<String>,
    /// Open price.
    #[serde(default)]
    pub open: Option<String>,
    /// 24h low.
    #[serde(default)]
    pub low: Option<String>,
    /// 24h high.
    #[serde(default)]
    pub high: Option<String>,
    /// 24h base volume.
    #[serde(default)]
    pub volume: Option<String>,
    /// 24h quote volume.
    #[serde(default)]
    pub volume_quote: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A field of a [`TickerUpdate`] that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConversionFailure {
    /// Wire name of the field.
    pub field: &'static str,
    /// The raw value that failed to parse.
    pub raw: String,
}

/// Result of converting a [`TickerUpdate`].
///
/// Conversion never fails as a whole: unparsable fields become zero (or no
/// timestamp) and are listed in `failures`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// The converted quote.
    pub quote: RawQuote,
    /// Fields that fell back to their zero value.
    pub failures: Vec<FieldConversionFailure>,
}

// =============================================================================
// Conversion
// =============================================================================

impl TickerUpdate {
    /// Convert string-encoded fields into a [`RawQuote`].
    ///
    /// Missing or empty fields become zero silently. Present but unparsable
    /// fields become zero and are reported in [`Conversion::failures`].
    #[must_use]
    pub fn convert(&self) -> Conversion {
        let mut failures = Vec::new();
        let mut decimal = |field: &'static str, raw: Option<&String>| {
            parse_decimal_field(field, raw.map(String::as_str), &mut failures)
        };

        let ask = decimal("ask", self.ask.as_ref());
        let bid = decimal("bid", self.bid.as_ref());
        let last = decimal("last", self.last.as_ref());
        let open = decimal("open", self.open.as_ref());
        let low = decimal("low", self.low.as_ref());
        let high = decimal("high", self.high.as_ref());
        let volume = decimal("volume", self.volume.as_ref());
        let volume_quote = decimal("volumeQuote", self.volume_quote.as_ref());

        let timestamp = match self.timestamp.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(_) => {
                    failures.push(FieldConversionFailure {
                        field: "timestamp",
                        raw: raw.to_string(),
                    });
                    None
                }
            },
        };

        Conversion {
            quote: RawQuote {
                symbol: self.symbol.clone(),
                ask,
                bid,
                last,
                open,
                low,
                high,
                volume,
                volume_quote,
                timestamp,
            },
            failures,
        }
    }
}

fn parse_decimal_field(
    field: &'static str,
    raw: Option<&str>,
    failures: &mut Vec<FieldConversionFailure>,
) -> Decimal {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Decimal::ZERO;
    };

    // Scientific notation shows up for very small volumes.
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or_else(|_| {
            failures.push(FieldConversionFailure {
                field,
                raw: raw.to_string(),
            });
            Decimal::ZERO
        })
}

// =============================================================================
// Tests
// =============================================================================
