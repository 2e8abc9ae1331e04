//! Summary Store
//!
//! Concurrent `symbol → latest record` map shared by the lookup path and
//! every feed listener.
//!
//! # Consistency
//!
//! - Each `set` for a symbol is linearizable; the last writer wins, whatever
//!   its source. No timestamps are compared.
//! - Readers never see a partially written record: values are cloned out
//!   while the shard guard is held.
//! - Locking is per shard, so a write for one symbol does not stall readers
//!   of unrelated symbols.
//! - Entries are never removed.

use dashmap::DashMap;

use super::summary::{SummaryRecord, Symbol};

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Enumeration was requested while nothing is cached.
    #[error("no data present")]
    EmptyCache,
}

/// Sharded in-memory summary cache.
///
/// # Example
///
/// ```rust
/// use summary_cache::domain::store::{StoreError, SummaryStore};
///
/// let store = SummaryStore::new();
/// assert_eq!(store.get_all(), Err(StoreError::EmptyCache));
/// assert!(store.get("ETHBTC").is_none());
/// ```
#[derive(Debug, Default)]
pub struct SummaryStore {
    entries: DashMap<Symbol, SummaryRecord>,
}

impl SummaryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest record for `symbol`, if one was ever written.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<SummaryRecord> {
        self.entries.get(symbol).map(|entry| entry.value().clone())
    }

    /// Replace the record for `symbol`, returning what was there before.
    pub fn set(&self, symbol: impl Into<Symbol>, record: SummaryRecord) -> Option<SummaryRecord> {
        self.entries.insert(symbol.into(), record)
    }

    /// Every cached record, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyCache`] when nothing has been cached yet.
    pub fn get_all(&self) -> Result<Vec<SummaryRecord>, StoreError> {
        let records: Vec<SummaryRecord> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if records.is_empty() {
            Err(StoreError::EmptyCache)
        } else {
            Ok(records)
        }
    }

    /// Whether a record exists for `symbol`.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    /// Number of cached symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::*;

    fn record(symbol: &str, last: i64) -> SummaryRecord {
        SummaryRecord {
            id: symbol.to_string(),
            full_name: String::new(),
            ask: Decimal::ZERO,
            bid: Decimal::ZERO,
            last: Decimal::new(last, 0),
            open: Decimal::ZERO,
            low: Decimal::ZERO,
            high: Decimal::ZERO,
            volume: Decimal::ZERO,
            volume_quote: Decimal::ZERO,
            timestamp: None,
            symbol: symbol.to_string(),
            fee_currency: String::new(),
        }
    }

    #[test]
    fn empty_store_reports_empty_cache() {
        let store = SummaryStore::new();

        assert_eq!(store.get_all(), Err(StoreError::EmptyCache));
        assert!(store.is_empty());
    }

    #[test]
    fn single_set_is_enumerated() {
        let store = SummaryStore::new();
        store.set("ETHBTC", record("ETHBTC", 1));

        let all = store.get_all().unwrap();
        assert_eq!(all, vec![record("ETHBTC", 1)]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_returns_previous_value() {
        let store = SummaryStore::new();

        assert!(store.set("ETHBTC", record("ETHBTC", 1)).is_none());
        let previous = store.set("ETHBTC", record("ETHBTC", 2));

        assert_eq!(previous, Some(record("ETHBTC", 1)));
        assert_eq!(store.get("ETHBTC"), Some(record("ETHBTC", 2)));
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let store = SummaryStore::new();
        store.set("ETHBTC", record("ETHBTC", 1));

        assert!(store.get("ethbtc").is_none());
        assert!(store.contains("ETHBTC"));
    }

    #[test]
    fn concurrent_writers_on_distinct_symbols() {
        let store = Arc::new(SummaryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let symbol = format!("SYM{i}");
                    for n in 0..100 {
                        store.set(symbol.clone(), record(&symbol, n));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for i in 0..8 {
            let symbol = format!("SYM{i}");
            assert_eq!(store.get(&symbol).unwrap().last, Decimal::new(99, 0));
        }
    }

    #[test]
    fn concurrent_writers_on_one_symbol_leave_one_whole_record() {
        let store = Arc::new(SummaryStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        store.set("ETHBTC", record("ETHBTC", i));
                        let seen = store.get("ETHBTC").unwrap();
                        assert_eq!(seen.symbol, "ETHBTC");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        let last = store.get("ETHBTC").unwrap().last;
        assert!((0..8).any(|i| Decimal::new(i, 0) == last));
    }

    proptest! {
        #[test]
        fn last_write_wins(writes in prop::collection::vec((0usize..4, any::<i64>()), 1..64)) {
            let symbols = ["ETHBTC", "XRPBTC", "LTCBTC", "BTCUSD"];
            let store = SummaryStore::new();
            let mut expected = std::collections::HashMap::new();

            for (idx, last) in writes {
                let symbol = symbols[idx];
                store.set(symbol, record(symbol, last));
                expected.insert(symbol, last);
            }

            for (symbol, last) in &expected {
                prop_assert_eq!(store.get(symbol).map(|r| r.last), Some(Decimal::new(*last, 0)));
            }
            prop_assert_eq!(store.len(), expected.len());
        }
    }
}
