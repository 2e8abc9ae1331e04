//! Port Interfaces
//!
//! Contracts the core depends on, implemented by infrastructure adapters.
//!
//! ## Driven Ports (Outbound)
//!
//! - `QuoteSourcePort`: one-shot ticker fetches and reference listings
//! - `TickerFeedPort`: per-symbol live update channels

mod quote_source_port;
mod ticker_feed_port;

#[cfg(test)]
pub use quote_source_port::MockQuoteSourcePort;
pub use quote_source_port::{CurrencyListing, QuoteSourceError, QuoteSourcePort, SymbolListing};
pub use ticker_feed_port::{FeedError, TickerFeedPort};
