//! Read-Through Resolver
//!
//! The miss path: serve from the store when possible, otherwise fetch,
//! enrich, conditionally cache and return.
//!
//! The membership check and the write are not atomic with the lookup. Two
//! concurrent misses for the same symbol both fetch and both write; the
//! store keeps whichever write lands last. There is no in-flight
//! deduplication.

use std::sync::Arc;
use std::time::Instant;

use crate::application::ports::{QuoteSourceError, QuoteSourcePort};
use crate::domain::reference::ReferenceData;
use crate::domain::store::SummaryStore;
use crate::domain::summary::SummaryRecord;
use crate::infrastructure::metrics::{self, LookupOutcome};

/// Resolution error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The quote source could not produce a quote.
    #[error("upstream unavailable for {symbol}: {source}")]
    UpstreamUnavailable {
        /// Symbol that was requested.
        symbol: String,
        /// Underlying source error, unchanged.
        source: QuoteSourceError,
    },
}

/// Read-through lookup over the shared store.
pub struct SummaryResolver {
    source: Arc<dyn QuoteSourcePort>,
    store: Arc<SummaryStore>,
    reference: Arc<ReferenceData>,
}

impl SummaryResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(
        source: Arc<dyn QuoteSourcePort>,
        store: Arc<SummaryStore>,
        reference: Arc<ReferenceData>,
    ) -> Self {
        Self {
            source,
            store,
            reference,
        }
    }

    /// Resolve the latest summary for `symbol`.
    ///
    /// Cached records are returned as-is with no freshness check. On a miss
    /// the quote is fetched and enriched by the symbol the source reports
    /// (the requested one if it reports none). It is written under
    /// `symbol` only when that reported symbol is supported, and returned
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UpstreamUnavailable`] if the fetch fails.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, symbol: &str) -> Result<SummaryRecord, ResolveError> {
        if let Some(record) = self.store.get(symbol) {
            metrics::record_lookup(LookupOutcome::Hit);
            tracing::debug!(symbol, "Summary served from cache");
            return Ok(record);
        }

        let started = Instant::now();
        let fetched = self.source.fetch_quote(symbol).await;
        metrics::record_fetch_duration(fetched.is_ok(), started.elapsed());

        let quote = match fetched {
            Ok(quote) => quote,
            Err(source) => {
                metrics::record_lookup(LookupOutcome::Error);
                tracing::warn!(symbol, error = %source, "Quote fetch failed");
                return Err(ResolveError::UpstreamUnavailable {
                    symbol: symbol.to_string(),
                    source,
                });
            }
        };

        // Enrichment and membership follow the symbol the source reports;
        // the cache stays keyed by the requested one.
        let upstream = if quote.symbol.is_empty() {
            symbol.to_string()
        } else {
            quote.symbol.clone()
        };
        let record = self.reference.enrich(&upstream, quote);

        if self.reference.is_supported(&upstream) {
            self.store.set(symbol, record.clone());
            metrics::record_lookup(LookupOutcome::MissCached);
            tracing::debug!(symbol, "Summary fetched and cached");
        } else {
            metrics::record_lookup(LookupOutcome::MissUncached);
            tracing::debug!(symbol, "Summary fetched for unsupported symbol, not cached");
        }

        Ok(record)
    }
}
