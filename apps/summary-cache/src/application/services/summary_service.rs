//! Summary Service
//!
//! Inbound facade used by the HTTP layer: single-symbol lookups through the
//! resolver, enumeration of the cache, and symbol membership queries.

use std::sync::Arc;

use super::resolver::{ResolveError, SummaryResolver};
use crate::application::ports::QuoteSourcePort;
use crate::domain::reference::ReferenceData;
use crate::domain::store::{StoreError, SummaryStore};
use crate::domain::summary::SummaryRecord;

/// Read-side entry point over the shared cache.
pub struct SummaryService {
    resolver: SummaryResolver,
    store: Arc<SummaryStore>,
    reference: Arc<ReferenceData>,
}

impl SummaryService {
    /// Create the service over a shared store and reference data.
    #[must_use]
    pub fn new(
        source: Arc<dyn QuoteSourcePort>,
        store: Arc<SummaryStore>,
        reference: Arc<ReferenceData>,
    ) -> Self {
        Self {
            resolver: SummaryResolver::new(source, Arc::clone(&store), Arc::clone(&reference)),
            store,
            reference,
        }
    }

    /// Latest summary for `symbol`, fetching on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UpstreamUnavailable`] if the miss fetch fails.
    pub async fn lookup(&self, symbol: &str) -> Result<SummaryRecord, ResolveError> {
        self.resolver.resolve(symbol).await
    }

    /// Every cached summary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyCache`] when nothing is cached.
    pub fn all_cached(&self) -> Result<Vec<SummaryRecord>, StoreError> {
        self.store.get_all()
    }

    /// Whether the exchange lists `symbol`.
    #[must_use]
    pub fn is_listed(&self, symbol: &str) -> bool {
        self.reference.is_listed(symbol)
    }

    /// Whether `symbol` is in the supported set.
    #[must_use]
    pub fn is_supported(&self, symbol: &str) -> bool {
        self.reference.is_supported(symbol)
    }

    /// Number of cached symbols.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.store.len()
    }

    /// Number of symbols the exchange lists.
    #[must_use]
    pub fn listed_count(&self) -> usize {
        self.reference.listed_count()
    }

    /// Number of supported symbols.
    #[must_use]
    pub fn supported_count(&self) -> usize {
        self.reference.supported_symbols().len()
    }
}
