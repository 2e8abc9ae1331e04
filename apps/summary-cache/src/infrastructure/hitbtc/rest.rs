//! HitBTC REST Client
//!
//! [`QuoteSourcePort`] over the public REST API. Transient failures
//! (network errors, 408 and 5xx) are retried with exponential backoff;
//! 429 honours `Retry-After`. Other statuses fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::application::ports::{
    CurrencyListing, QuoteSourceError, QuoteSourcePort, SymbolListing,
};
use crate::domain::summary::RawQuote;
use crate::infrastructure::config::ExchangeSettings;
use crate::infrastructure::hitbtc::backoff::{BackoffConfig, BackoffPolicy};
use crate::infrastructure::hitbtc::messages::{
    ApiErrorResponse, CurrencyResponse, SymbolResponse, TickerResponse,
};

/// REST client settings.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL without trailing slash, e.g. `https://api.hitbtc.com/api/2`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffConfig,
}

impl RestClientConfig {
    /// Build from exchange settings.
    #[must_use]
    pub fn from_settings(settings: &ExchangeSettings) -> Self {
        Self {
            base_url: settings.rest_url.clone(),
            timeout: settings.request_timeout,
            max_attempts: settings.max_retries.max(1),
            backoff: BackoffConfig::for_rest(),
        }
    }
}

/// HitBTC public REST API client.
#[derive(Debug, Clone)]
pub struct HitBtcRestClient {
    client: Client,
    config: RestClientConfig,
}

impl HitBtcRestClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteSourceError::Network`] if the HTTP client cannot be
    /// built.
    pub fn new(config: RestClientConfig) -> Result<Self, QuoteSourceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QuoteSourceError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// GET `{base_url}{path}` and decode the JSON body, retrying transient
    /// failures.
    #[allow(clippy::too_many_lines)]
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, QuoteSourceError> {
        let url = format!("{}{path}", self.config.base_url);
        let mut backoff = BackoffPolicy::new(self.config.backoff.clone());
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let exhausted = attempt >= self.config.max_attempts;

            let response = match self.client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if exhausted {
                        tracing::warn!(url = %url, error = %e, attempt, "Network error, giving up");
                        return Err(if attempt == 1 {
                            QuoteSourceError::Network(e.to_string())
                        } else {
                            QuoteSourceError::MaxRetriesExceeded {
                                attempts: attempt,
                                last_error: e.to_string(),
                            }
                        });
                    }
                    let delay = backoff.next_delay().unwrap_or(self.config.backoff.max_delay);
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        delay_ms = delay.as_millis(),
                        attempt,
                        "Network error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| QuoteSourceError::Network(e.to_string()))?;
                return decode_body(&text);
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());

            let body = response.text().await.unwrap_or_default();
            let (code, message) = error_details(status, &body);

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    if exhausted {
                        return Err(QuoteSourceError::RateLimited {
                            retry_after_secs: retry_after.unwrap_or(1),
                        });
                    }
                    // Never wait longer than the schedule allows, whatever the header says.
                    let delay = retry_after
                        .map(Duration::from_secs)
                        .or_else(|| backoff.next_delay())
                        .map_or(self.config.backoff.max_delay, |d| {
                            d.min(self.config.backoff.max_delay)
                        });
                    tracing::warn!(url = %url, delay_ms = delay.as_millis(), "Rate limited, retrying");
                    tokio::time::sleep(delay).await;
                }
                ErrorCategory::Retryable => {
                    if exhausted {
                        tracing::warn!(url = %url, code = %code, message = %message, "Giving up");
                        return Err(QuoteSourceError::MaxRetriesExceeded {
                            attempts: attempt,
                            last_error: format!("{code}: {message}"),
                        });
                    }
                    let delay = backoff.next_delay().unwrap_or(self.config.backoff.max_delay);
                    tracing::warn!(
                        url = %url,
                        code = %code,
                        message = %message,
                        delay_ms = delay.as_millis(),
                        "Retryable error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                ErrorCategory::NonRetryable => {
                    return Err(QuoteSourceError::Api { code, message });
                }
            }
        }
    }
}

#[async_trait]
impl QuoteSourcePort for HitBtcRestClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, QuoteSourceError> {
        let path = format!("/public/ticker/{}", symbol.to_uppercase());
        let ticker: TickerResponse = self.get(&path).await?;
        Ok(ticker.into())
    }

    async fn list_symbols(&self) -> Result<Vec<SymbolListing>, QuoteSourceError> {
        let symbols: Vec<SymbolResponse> = self.get("/public/symbol").await?;
        Ok(symbols.into_iter().map(Into::into).collect())
    }

    async fn list_currencies(&self) -> Result<Vec<CurrencyListing>, QuoteSourceError> {
        let currencies: Vec<CurrencyResponse> = self.get("/public/currency").await?;
        Ok(currencies.into_iter().map(Into::into).collect())
    }
}

/// Decode a 2xx body, treating an embedded `error` object as a failure.
fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, QuoteSourceError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| QuoteSourceError::InvalidResponse(e.to_string()))?;

    if value.get("error").is_some_and(|e| !e.is_null()) {
        return match serde_json::from_value::<ApiErrorResponse>(value) {
            Ok(err) => Err(QuoteSourceError::Api {
                code: err.error.code.to_string(),
                message: err.error.message,
            }),
            Err(e) => Err(QuoteSourceError::InvalidResponse(e.to_string())),
        };
    }

    serde_json::from_value(value).map_err(|e| QuoteSourceError::InvalidResponse(e.to_string()))
}

/// Code and message from an error body, falling back to the status.
fn error_details(status: StatusCode, body: &str) -> (String, String) {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(err) => {
            let message = match err.error.description {
                Some(description) if !description.is_empty() => {
                    format!("{}: {description}", err.error.message)
                }
                _ => err.error.message,
            };
            (err.error.code.to_string(), message)
        }
        Err(_) => (status.as_u16().to_string(), body.to_string()),
    }
}

/// Retry behaviour for a failed status.
#[derive(Debug, PartialEq, Eq)]
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}
