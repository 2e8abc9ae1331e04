//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the process
//! plumbing around them.

/// Configuration loaded from the environment.
pub mod config;

/// HitBTC REST and WebSocket adapters.
pub mod hitbtc;

/// Currency API, health and metrics HTTP endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
