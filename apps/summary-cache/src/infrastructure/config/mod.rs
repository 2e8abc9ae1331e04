//! Configuration Module
//!
//! Environment-driven configuration for the summary cache.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_REST_URL, DEFAULT_WS_URL, ExchangeSettings, FeedSettings, ServerSettings,
    ServiceConfig,
};
