//! Reference Data
//!
//! Read-mostly lookups built once at startup and shared behind an `Arc`:
//!
//! - the exchange's full symbol listing (decides what counts as a valid symbol)
//! - the supported set (decides what gets cached and subscribed)
//! - `symbol → fee currency`
//! - `currency → display name`
//!
//! Nothing here is mutated after construction, so readers never lock.

use std::collections::{HashMap, HashSet};

use super::summary::{RawQuote, SummaryRecord, Symbol};

/// Immutable enrichment tables and symbol sets.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    listed: HashSet<Symbol>,
    supported: Vec<Symbol>,
    supported_index: HashSet<Symbol>,
    fee_currency: HashMap<Symbol, String>,
    full_names: HashMap<String, String>,
}

impl ReferenceData {
    /// Start building reference data.
    #[must_use]
    pub fn builder() -> ReferenceDataBuilder {
        ReferenceDataBuilder::default()
    }

    /// Empty reference data: nothing listed, nothing supported.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the exchange lists `symbol` at all.
    #[must_use]
    pub fn is_listed(&self, symbol: &str) -> bool {
        self.listed.contains(symbol)
    }

    /// Whether results for `symbol` may be cached and streamed.
    #[must_use]
    pub fn is_supported(&self, symbol: &str) -> bool {
        self.supported_index.contains(symbol)
    }

    /// Supported symbols in listing order.
    #[must_use]
    pub fn supported_symbols(&self) -> &[Symbol] {
        &self.supported
    }

    /// Number of listed symbols.
    #[must_use]
    pub fn listed_count(&self) -> usize {
        self.listed.len()
    }

    /// Fee currency for `symbol`, or `""` when unknown.
    #[must_use]
    pub fn fee_currency(&self, symbol: &str) -> &str {
        self.fee_currency.get(symbol).map_or("", String::as_str)
    }

    /// Display name for `currency`, or `""` when unknown.
    #[must_use]
    pub fn full_name(&self, currency: &str) -> &str {
        self.full_names.get(currency).map_or("", String::as_str)
    }

    /// Turn a quote into a cacheable record keyed by `symbol`.
    ///
    /// `symbol` is the key the caller looked up or subscribed with, which
    /// also becomes `id`. The fee currency is looked up by symbol and the
    /// display name by fee currency; either falls back to an empty string.
    #[must_use]
    pub fn enrich(&self, symbol: &str, quote: RawQuote) -> SummaryRecord {
        let fee_currency = self.fee_currency(symbol).to_string();
        let full_name = self.full_name(&fee_currency).to_string();

        SummaryRecord {
            id: symbol.to_string(),
            full_name,
            ask: quote.ask,
            bid: quote.bid,
            last: quote.last,
            open: quote.open,
            low: quote.low,
            high: quote.high,
            volume: quote.volume,
            volume_quote: quote.volume_quote,
            timestamp: quote.timestamp,
            symbol: symbol.to_string(),
            fee_currency,
        }
    }
}

/// Builder for [`ReferenceData`].
#[derive(Debug, Default)]
pub struct ReferenceDataBuilder {
    listed: Vec<(Symbol, String)>,
    full_names: HashMap<String, String>,
    allowlist: Option<Vec<Symbol>>,
}

impl ReferenceDataBuilder {
    /// Add a listed symbol with its fee currency.
    #[must_use]
    pub fn listed(mut self, symbol: impl Into<Symbol>, fee_currency: impl Into<String>) -> Self {
        self.listed.push((symbol.into(), fee_currency.into()));
        self
    }

    /// Add a currency display name.
    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>, full_name: impl Into<String>) -> Self {
        self.full_names.insert(currency.into(), full_name.into());
        self
    }

    /// Narrow the supported set to these symbols.
    ///
    /// Symbols that are not listed are ignored. Without an allowlist every
    /// listed symbol is supported.
    #[must_use]
    pub fn allowlist(mut self, symbols: Vec<Symbol>) -> Self {
        self.allowlist = Some(symbols);
        self
    }

    /// Build the immutable reference data.
    #[must_use]
    pub fn build(self) -> ReferenceData {
        let allow: Option<HashSet<Symbol>> = self
            .allowlist
            .filter(|list| !list.is_empty())
            .map(|list| list.into_iter().collect());

        let mut listed = HashSet::with_capacity(self.listed.len());
        let mut supported = Vec::new();
        let mut fee_currency = HashMap::with_capacity(self.listed.len());

        for (symbol, fee) in self.listed {
            if !listed.insert(symbol.clone()) {
                continue;
            }
            if allow.as_ref().is_none_or(|allow| allow.contains(&symbol)) {
                supported.push(symbol.clone());
            }
            fee_currency.insert(symbol, fee);
        }

        let supported_index = supported.iter().cloned().collect();

        ReferenceData {
            listed,
            supported,
            supported_index,
            fee_currency,
            full_names: self.full_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn sample() -> ReferenceData {
        ReferenceData::builder()
            .listed("ETHBTC", "BTC")
            .listed("XRPBTC", "BTC")
            .listed("DOGEUSD", "USD")
            .currency("BTC", "Bitcoin")
            .build()
    }

    #[test]
    fn every_listed_symbol_supported_without_allowlist() {
        let data = sample();

        assert_eq!(data.supported_symbols(), ["ETHBTC", "XRPBTC", "DOGEUSD"]);
        assert!(data.is_supported("XRPBTC"));
        assert_eq!(data.listed_count(), 3);
    }

    #[test]
    fn allowlist_narrows_supported_but_not_listed() {
        let data = ReferenceData::builder()
            .listed("ETHBTC", "BTC")
            .listed("XRPBTC", "BTC")
            .allowlist(vec!["ETHBTC".to_string(), "NOTLISTED".to_string()])
            .build();

        assert_eq!(data.supported_symbols(), ["ETHBTC"]);
        assert!(!data.is_supported("XRPBTC"));
        assert!(!data.is_supported("NOTLISTED"));
        assert!(data.is_listed("XRPBTC"));
        assert!(!data.is_listed("NOTLISTED"));
    }

    #[test]
    fn empty_allowlist_means_everything() {
        let data = ReferenceData::builder()
            .listed("ETHBTC", "BTC")
            .allowlist(Vec::new())
            .build();

        assert!(data.is_supported("ETHBTC"));
    }

    #[test]
    fn duplicate_listing_is_kept_once() {
        let data = ReferenceData::builder()
            .listed("ETHBTC", "BTC")
            .listed("ETHBTC", "ETH")
            .build();

        assert_eq!(data.supported_symbols(), ["ETHBTC"]);
        assert_eq!(data.fee_currency("ETHBTC"), "BTC");
    }

    #[test]
    fn enrich_fills_fee_currency_and_name() {
        let data = sample();
        let quote = RawQuote {
            symbol: "ETHBTC".to_string(),
            last: Decimal::new(35, 3),
            ..RawQuote::default()
        };

        let record = data.enrich("ETHBTC", quote);

        assert_eq!(record.id, "ETHBTC");
        assert_eq!(record.symbol, "ETHBTC");
        assert_eq!(record.fee_currency, "BTC");
        assert_eq!(record.full_name, "Bitcoin");
        assert_eq!(record.last, Decimal::new(35, 3));
    }

    #[test]
    fn enrich_falls_back_to_empty_strings() {
        let data = sample();

        let unknown = data.enrich("FOOBAR", RawQuote::default());
        assert_eq!(unknown.fee_currency, "");
        assert_eq!(unknown.full_name, "");

        // USD is listed as a fee currency but has no display name.
        let no_name = data.enrich("DOGEUSD", RawQuote::default());
        assert_eq!(no_name.fee_currency, "USD");
        assert_eq!(no_name.full_name, "");
    }

    #[test]
    fn enrich_keys_by_requested_symbol() {
        let data = sample();
        let quote = RawQuote {
            symbol: "ethbtc".to_string(),
            ..RawQuote::default()
        };

        let record = data.enrich("ETHBTC", quote);

        assert_eq!(record.symbol, "ETHBTC");
        assert_eq!(record.id, "ETHBTC");
    }
}
