//! JSON-RPC Codec
//!
//! Encodes subscription requests and classifies incoming WebSocket text
//! frames. A frame carrying `method` is a notification; anything else with
//! an `id` is a response to one of our requests.

use serde_json::Value;

use crate::domain::summary::TickerUpdate;
use crate::infrastructure::hitbtc::messages::{RpcErrorBody, RpcRequest, SymbolParams, methods};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is valid JSON but not a JSON-RPC message we understand.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to a request we sent.
    Response {
        /// Correlation id, normalized to a string.
        id: String,
        /// `result` on success, `error` otherwise.
        outcome: Result<Value, RpcErrorBody>,
    },
    /// A ticker notification.
    Ticker(TickerUpdate),
    /// A notification for some other method.
    Notification {
        /// Method name.
        method: String,
    },
}

/// JSON-RPC codec for the HitBTC WebSocket API.
#[derive(Debug, Default, Clone)]
pub struct RpcCodec;

impl RpcCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a `{"symbol": …}` request.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_request(&self, method: &str, symbol: &str, id: &str) -> Result<String, CodecError> {
        let request = RpcRequest {
            method,
            params: SymbolParams { symbol },
            id,
        };
        Ok(serde_json::to_string(&request)?)
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, frames that are neither a
    /// notification nor a response, and ticker notifications whose
    /// `params` do not fit [`TickerUpdate`].
    pub fn decode(&self, text: &str) -> Result<Inbound, CodecError> {
        let mut value: Value = serde_json::from_str(text)?;
        let Some(object) = value.as_object_mut() else {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                truncate(text)
            )));
        };

        if let Some(method) = object.get("method").and_then(Value::as_str) {
            if method != methods::TICKER {
                return Ok(Inbound::Notification {
                    method: method.to_string(),
                });
            }
            let params = object
                .remove("params")
                .ok_or_else(|| CodecError::InvalidFormat("ticker without params".to_string()))?;
            return Ok(Inbound::Ticker(serde_json::from_value(params)?));
        }

        let id = match object.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(CodecError::InvalidFormat(format!(
                    "frame has neither method nor id: {}",
                    truncate(text)
                )));
            }
        };

        let outcome = match object.remove("error") {
            Some(error) if !error.is_null() => Err(serde_json::from_value(error)?),
            _ => Ok(object.remove("result").unwrap_or(Value::Null)),
        };

        Ok(Inbound::Response { id, outcome })
    }
}

fn truncate(text: &str) -> &str {
    text.char_indices()
        .nth(64)
        .map_or(text, |(end, _)| &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ticker_notification() {
        let frame = r#"{"jsonrpc":"2.0","method":"ticker","params":{
            "ask":"0.054464","bid":"0.054463","last":"0.054463","open":"0.057133",
            "low":"0.053615","high":"0.057559","volume":"33068.346",
            "volumeQuote":"1832.687530","timestamp":"2017-10-19T15:45:44.941Z",
            "symbol":"ETHBTC"}}"#;

        let Inbound::Ticker(update) = RpcCodec::new().decode(frame).unwrap() else {
            panic!("expected ticker");
        };

        assert_eq!(update.symbol, "ETHBTC");
        assert_eq!(update.ask.as_deref(), Some("0.054464"));
        assert_eq!(update.volume_quote.as_deref(), Some("1832.687530"));
    }

    #[test]
    fn decodes_success_response_with_string_id() {
        let frame = r#"{"jsonrpc":"2.0","result":true,"id":"abc"}"#;

        let decoded = RpcCodec::new().decode(frame).unwrap();

        assert_eq!(
            decoded,
            Inbound::Response {
                id: "abc".to_string(),
                outcome: Ok(Value::Bool(true)),
            }
        );
    }

    #[test]
    fn decodes_error_response_with_numeric_id() {
        let frame = r#"{"jsonrpc":"2.0","error":{"code":2001,"message":"Symbol not found"},"id":7}"#;

        let Inbound::Response { id, outcome } = RpcCodec::new().decode(frame).unwrap() else {
            panic!("expected response");
        };

        assert_eq!(id, "7");
        let err = outcome.unwrap_err();
        assert_eq!(err.code, 2001);
        assert_eq!(err.message, "Symbol not found");
    }

    #[test]
    fn other_notifications_pass_through() {
        let frame = r#"{"jsonrpc":"2.0","method":"snapshotOrderbook","params":{}}"#;

        let decoded = RpcCodec::new().decode(frame).unwrap();

        assert_eq!(
            decoded,
            Inbound::Notification {
                method: "snapshotOrderbook".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        let codec = RpcCodec::new();

        assert!(matches!(codec.decode("not json"), Err(CodecError::Json(_))));
        assert!(matches!(codec.decode("[1,2]"), Err(CodecError::InvalidFormat(_))));
        assert!(matches!(
            codec.decode(r#"{"jsonrpc":"2.0"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            codec.decode(r#"{"method":"ticker"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn ticker_without_symbol_is_a_decode_error() {
        let frame = r#"{"method":"ticker","params":{"ask":"1"}}"#;

        assert!(matches!(RpcCodec::new().decode(frame), Err(CodecError::Json(_))));
    }

    #[test]
    fn encodes_subscribe_request() {
        let text = RpcCodec::new()
            .encode_request(methods::SUBSCRIBE_TICKER, "ETHBTC", "1")
            .unwrap();

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["method"], "subscribeTicker");
        assert_eq!(value["params"]["symbol"], "ETHBTC");
        assert_eq!(value["id"], "1");
    }
}
