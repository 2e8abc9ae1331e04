//! Domain Layer - Summary records, reference data and the shared cache.
//!
//! Pure types with no I/O. The store is the only mutable shared state in
//! the service.

/// Summary records and incoming quote shapes.
pub mod summary;

/// Supported symbol set and enrichment tables.
pub mod reference;

/// Concurrent summary cache.
pub mod store;
