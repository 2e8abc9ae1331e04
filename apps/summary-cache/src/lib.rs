#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Summary Cache - Market Summary Read-Through Cache
//!
//! Serves the latest market summary per trading symbol from an in-memory
//! cache kept warm two ways: lookups fetch and cache on a miss, and a live
//! ticker subscription per supported symbol overwrites entries as updates
//! arrive.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Records, reference data and the shared store
//!   - `summary`: `SummaryRecord`, `RawQuote`, `TickerUpdate` and decimal conversion
//!   - `reference`: Supported set, fee currencies, currency names
//!   - `store`: Concurrent last-write-wins cache
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Quote source (pull) and ticker feed (push)
//!   - `services`: Read-through resolver, feed coordinator, read facade
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `hitbtc`: REST and WebSocket clients for the exchange
//!   - `http`: Currency API, health and metrics endpoints
//!   - `config`, `metrics`, `telemetry`: Process plumbing
//!
//! # Data Flow
//!
//! ```text
//!                  miss: fetch ┌──────────────┐
//! GET /currency/S ───────────► │   Resolver   │──► HitBTC REST
//!        ▲                     └──────┬───────┘
//!        │ hit                        │ set (supported only)
//!        │                     ┌──────▼───────┐
//!        └──────────────────── │ SummaryStore │
//!                              └──────▲───────┘
//!                                     │ set
//!                              ┌──────┴───────┐
//!  HitBTC WS ticker ─────────► │  Listener S  │  (one per supported symbol)
//!                              └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Records, reference data and the cache.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::reference::{ReferenceData, ReferenceDataBuilder};
pub use domain::store::{StoreError, SummaryStore};
pub use domain::summary::{RawQuote, SummaryRecord, Symbol, TickerUpdate};

// Ports
pub use application::ports::{
    CurrencyListing, FeedError, QuoteSourceError, QuoteSourcePort, SymbolListing, TickerFeedPort,
};

// Services
pub use application::services::{
    FeedCoordinator, ResolveError, StartReport, SubscriptionState, SummaryResolver, SummaryService,
    load_reference_data,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ServiceConfig};

// Exchange adapters
pub use infrastructure::hitbtc::{
    FeedHealth, HitBtcRestClient, HitBtcStreamClient, RestClientConfig, StreamClientConfig,
};

// HTTP server
pub use infrastructure::http::{ApiServer, ApiServerError, ApiState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
