//! Core JSON-RPC 2.0 types and codec for chainstream
//!
//! This crate holds everything the subscription client shares with its
//! collaborators (domain-specific subscription helpers, test doubles):
//!
//! - **Types**: JSON-RPC 2.0 envelopes plus the subscription request, id and
//!   notification params
//! - **Codec**: frame encoding/decoding with JSON-RPC error mapping
//! - **Error handling**: the error taxonomy of the subscription engine
//! - **Observability**: OpenTelemetry and tracing bootstrap
//!
//! # Example
//!
//! ```rust
//! use chainstream_core::{codec, Id, SubscriptionRequest};
//! use serde_json::json;
//!
//! let request = SubscriptionRequest::new("eth_subscribe").param(json!("newHeads"));
//! let frame = codec::encode_request(&request.to_rpc(Id::Number(1))).unwrap();
//! assert!(frame.contains("\"params\":[\"newHeads\"]"));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Id, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, SubscriptionId,
    SubscriptionParams, SubscriptionRequest,
};
