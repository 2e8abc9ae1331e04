//! HitBTC Exchange Adapters
//!
//! - [`rest`]: pull quotes and listings over the public REST API
//! - [`stream`]: live ticker subscriptions over the WebSocket API
//! - [`codec`] and [`messages`]: wire formats
//! - [`backoff`]: retry schedule shared by both clients
//! - [`health`]: stream connection state for health reporting
//! - [`supervisor`]: connect, resubscribe and reconnect loop for the stream

pub mod backoff;
pub mod codec;
pub mod health;
pub mod messages;
pub mod rest;
pub mod stream;
pub mod supervisor;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use codec::{CodecError, Inbound, RpcCodec};
pub use health::{ConnectionState, FeedHealth};
pub use rest::{HitBtcRestClient, RestClientConfig};
pub use stream::{HitBtcStreamClient, StreamClientConfig, StreamClientError};
pub use supervisor::supervise_feed;
