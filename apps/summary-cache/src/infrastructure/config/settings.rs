//! Service Configuration Settings
//!
//! Configuration types for the summary cache, loaded from environment
//! variables. Every value has a default; only malformed endpoint URLs are
//! rejected.

use std::time::Duration;

use reqwest::Url;

/// Default HitBTC REST base URL.
pub const DEFAULT_REST_URL: &str = "https://api.hitbtc.com/api/2";

/// Default HitBTC WebSocket URL.
pub const DEFAULT_WS_URL: &str = "wss://api.hitbtc.com/api/2/ws";

/// Exchange endpoint settings.
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    /// REST base URL (no trailing slash).
    pub rest_url: String,
    /// WebSocket URL.
    pub ws_url: String,
    /// Per-request timeout for REST calls.
    pub request_timeout: Duration,
    /// Attempts for retryable REST failures, including the first.
    pub max_retries: u32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// Live feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Buffered updates per symbol before new ones are dropped.
    pub channel_capacity: usize,
    /// How long to wait for a subscribe/unsubscribe answer.
    pub rpc_timeout: Duration,
    /// Initial delay between connection attempts.
    pub connect_delay_initial: Duration,
    /// Maximum delay between connection attempts.
    pub connect_delay_max: Duration,
    /// Connection attempts before giving up (0 = unlimited).
    pub connect_max_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            rpc_timeout: Duration::from_secs(10),
            connect_delay_initial: Duration::from_millis(500),
            connect_delay_max: Duration::from_secs(30),
            connect_max_attempts: 5,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Currency API, health and metrics port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Exchange endpoints.
    pub exchange: ExchangeSettings,
    /// Live feed settings.
    pub feed: FeedSettings,
    /// Server ports.
    pub server: ServerSettings,
    /// Allowlist narrowing the supported set (empty = every listed symbol).
    pub supported_symbols: Vec<String>,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint URL is empty or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint URL is empty or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let exchange_defaults = ExchangeSettings::default();
        let feed_defaults = FeedSettings::default();

        let rest_url = parse_url(
            &lookup,
            "HITBTC_REST_URL",
            &exchange_defaults.rest_url,
            &["http", "https"],
        )?;
        let ws_url = parse_url(
            &lookup,
            "HITBTC_WS_URL",
            &exchange_defaults.ws_url,
            &["ws", "wss"],
        )?;

        let exchange = ExchangeSettings {
            rest_url: rest_url.trim_end_matches('/').to_string(),
            ws_url,
            request_timeout: parse_duration_millis(
                &lookup,
                "SUMMARY_CACHE_REQUEST_TIMEOUT_MS",
                exchange_defaults.request_timeout,
            ),
            max_retries: parse_u32(
                &lookup,
                "SUMMARY_CACHE_MAX_RETRIES",
                exchange_defaults.max_retries,
            )
            .max(1),
        };

        let feed = FeedSettings {
            channel_capacity: parse_usize(
                &lookup,
                "SUMMARY_CACHE_FEED_CHANNEL_CAPACITY",
                feed_defaults.channel_capacity,
            )
            .max(1),
            rpc_timeout: parse_duration_millis(
                &lookup,
                "SUMMARY_CACHE_RPC_TIMEOUT_MS",
                feed_defaults.rpc_timeout,
            ),
            connect_delay_initial: parse_duration_millis(
                &lookup,
                "SUMMARY_CACHE_CONNECT_DELAY_INITIAL_MS",
                feed_defaults.connect_delay_initial,
            ),
            connect_delay_max: parse_duration_secs(
                &lookup,
                "SUMMARY_CACHE_CONNECT_DELAY_MAX_SECS",
                feed_defaults.connect_delay_max,
            ),
            connect_max_attempts: parse_u32(
                &lookup,
                "SUMMARY_CACHE_CONNECT_MAX_ATTEMPTS",
                feed_defaults.connect_max_attempts,
            ),
        };

        let server = ServerSettings {
            http_port: parse_u16(
                &lookup,
                "SUMMARY_CACHE_HTTP_PORT",
                ServerSettings::default().http_port,
            ),
        };

        let supported_symbols = lookup("SUMMARY_CACHE_SUPPORTED_SYMBOLS")
            .map(|raw| parse_symbol_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            exchange,
            feed,
            server,
            supported_symbols,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is not a usable URL.
    #[error("environment variable {key} is not a valid URL: {value}")]
    InvalidUrl {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn parse_url<F>(lookup: &F, key: &str, default: &str, schemes: &[&str]) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default.to_string());
    };

    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }

    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => Ok(value.to_string()),
        _ => Err(ConfigError::InvalidUrl {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_u16<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_usize<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.exchange.rest_url, DEFAULT_REST_URL);
        assert_eq!(config.exchange.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.exchange.request_timeout, Duration::from_secs(10));
        assert_eq!(config.exchange.max_retries, 3);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.feed.channel_capacity, 256);
        assert!(config.supported_symbols.is_empty());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("HITBTC_REST_URL", "http://localhost:9000/api/2/"),
            ("HITBTC_WS_URL", "ws://localhost:9001/ws"),
            ("SUMMARY_CACHE_HTTP_PORT", "9090"),
            ("SUMMARY_CACHE_REQUEST_TIMEOUT_MS", "250"),
            ("SUMMARY_CACHE_FEED_CHANNEL_CAPACITY", "8"),
            ("SUMMARY_CACHE_CONNECT_MAX_ATTEMPTS", "0"),
        ])
        .unwrap();

        assert_eq!(config.exchange.rest_url, "http://localhost:9000/api/2");
        assert_eq!(config.exchange.ws_url, "ws://localhost:9001/ws");
        assert_eq!(config.server.http_port, 9090);
        assert_eq!(config.exchange.request_timeout, Duration::from_millis(250));
        assert_eq!(config.feed.channel_capacity, 8);
        assert_eq!(config.feed.connect_max_attempts, 0);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("SUMMARY_CACHE_HTTP_PORT", "eighty"),
            ("SUMMARY_CACHE_FEED_CHANNEL_CAPACITY", "0"),
            ("SUMMARY_CACHE_MAX_RETRIES", "0"),
        ])
        .unwrap();

        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.feed.channel_capacity, 1);
        assert_eq!(config.exchange.max_retries, 1);
    }

    #[test]
    fn supported_symbols_are_trimmed_and_uppercased() {
        let config =
            config_from(&[("SUMMARY_CACHE_SUPPORTED_SYMBOLS", " ethbtc, XRPBTC ,,ltcbtc")])
                .unwrap();

        assert_eq!(config.supported_symbols, vec!["ETHBTC", "XRPBTC", "LTCBTC"]);
    }

    #[test]
    fn rejects_wrong_scheme() {
        let err = config_from(&[("HITBTC_WS_URL", "https://api.hitbtc.com/api/2/ws")]).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidUrl { ref key, .. } if key == "HITBTC_WS_URL"));
    }

    #[test]
    fn rejects_empty_url() {
        let err = config_from(&[("HITBTC_REST_URL", "  ")]).unwrap_err();

        assert_eq!(err, ConfigError::EmptyValue("HITBTC_REST_URL".to_string()));
    }

    #[test]
    fn feed_settings_defaults() {
        let settings = FeedSettings::default();
        assert_eq!(settings.connect_delay_initial, Duration::from_millis(500));
        assert_eq!(settings.connect_delay_max, Duration::from_secs(30));
        assert_eq!(settings.connect_max_attempts, 5);
        assert_eq!(settings.rpc_timeout, Duration::from_secs(10));
    }
}
