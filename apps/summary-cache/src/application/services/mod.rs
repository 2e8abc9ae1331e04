//! Application Services
//!
//! - `SummaryResolver`: read-through miss path
//! - `FeedCoordinator`: per-symbol push listeners
//! - `SummaryService`: facade for the HTTP layer
//! - `load_reference_data`: startup reference tables

mod feed_coordinator;
mod reference_loader;
mod resolver;
mod summary_service;

pub use feed_coordinator::{FeedCoordinator, StartReport, SubscriptionState};
pub use reference_loader::load_reference_data;
pub use resolver::{ResolveError, SummaryResolver};
pub use summary_service::SummaryService;
