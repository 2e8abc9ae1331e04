//! Application Layer - Services and port definitions.
//!
//! This layer wires the domain cache to the outside world through ports
//! and hosts the two writer paths: the read-through resolver and the feed
//! coordinator.

/// Port interfaces for the quote source and the ticker feed.
pub mod ports;

/// Resolver, feed coordinator and read facade.
pub mod services;
