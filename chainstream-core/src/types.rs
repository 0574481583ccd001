//! JSON-RPC 2.0 types used by the subscription engine
//!
//! Besides the generic JSON-RPC 2.0 envelopes (request, response,
//! notification), this module defines the shapes specific to node
//! subscriptions:
//!
//! - [`SubscriptionRequest`]: method name plus positional parameters, kept
//!   verbatim so it can be replayed on reconnection
//! - [`SubscriptionId`]: the node-assigned identifier returned by the handshake
//! - [`SubscriptionParams`]: the `params` object of a subscription notification
//!
//! # Wire Shapes
//!
//! ```text
//! → {"jsonrpc":"2.0","id":1,"method":"eth_subscribe","params":["newHeads"]}
//! ← {"jsonrpc":"2.0","id":1,"result":"0x9cef478923ff08bf67fde6c64013158d"}
//! ← {"jsonrpc":"2.0","method":"eth_subscription",
//!    "params":{"subscription":"0x9cef…","result":{...}}}
//! ```

use crate::error::JsonRpcErrorData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC 2.0 request ID
///
/// Serialized untagged, so it appears on the wire as a bare string, number
/// or `null`.
///
/// # Examples
///
/// ```rust
/// use chainstream_core::Id;
///
/// let id1: Id = "req-123".into();
/// let id2: Id = 42i64.into();
///
/// assert_eq!(id1.to_string(), "\"req-123\"");
/// assert_eq!(id2.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
    /// Null identifier (sent by peers that could not read the request id)
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

/// JSON-RPC 2.0 request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version - always "2.0"
    pub jsonrpc: String,
    /// Name of the remote method to invoke
    pub method: String,
    /// Optional parameters, skipped in JSON if None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Identifier correlating this request with its response
    pub id: Id,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    ///
    /// ```rust
    /// use chainstream_core::{JsonRpcRequest, Id};
    ///
    /// let request = JsonRpcRequest::new("eth_subscribe", None, Id::Number(1));
    /// assert_eq!(request.jsonrpc, "2.0");
    /// ```
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 notification message (no `id`, no response expected)
///
/// Nodes push subscription events as notifications whose `params` decode into
/// [`SubscriptionParams`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version - always "2.0"
    pub jsonrpc: String,
    /// Notification method, e.g. `eth_subscription`
    pub method: String,
    /// Optional parameters or event data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message
///
/// Carries exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version - always "2.0"
    pub jsonrpc: String,
    /// The result of the method invocation (present only on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (present only on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
    /// Request ID from the original request
    pub id: Id,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: serde_json::Value, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcErrorData, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Any single JSON-RPC 2.0 message received from the node
///
/// Untagged: variants are tried in order, so a message with both `method`
/// and `id` is a request, `method` alone is a notification, and `id` with
/// `result`/`error` is a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request message (expects a response)
    Request(JsonRpcRequest),
    /// A notification message (no response expected)
    Notification(JsonRpcNotification),
    /// A response message
    Response(JsonRpcResponse),
}

/// Node-assigned subscription identifier
///
/// Ethereum-style nodes hand out hex strings, Substrate and Solana nodes hand
/// out integers. Both are accepted and compared by value.
///
/// ```rust
/// use chainstream_core::SubscriptionId;
///
/// let id: SubscriptionId = serde_json::from_str("\"0x9ce5\"").unwrap();
/// assert_eq!(id.to_string(), "0x9ce5");
///
/// let id: SubscriptionId = serde_json::from_str("7").unwrap();
/// assert_eq!(id, SubscriptionId::Number(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionId {
    /// Numeric subscription id
    Number(u64),
    /// String subscription id
    String(String),
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionId::Number(n) => write!(f, "{}", n),
            SubscriptionId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for SubscriptionId {
    fn from(n: u64) -> Self {
        SubscriptionId::Number(n)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        SubscriptionId::String(s.to_string())
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        SubscriptionId::String(s)
    }
}

/// A subscription request: method name plus positional parameters
///
/// Immutable once handed to `subscribe`; the same value is replayed on every
/// reconnection.
///
/// ```rust
/// use chainstream_core::SubscriptionRequest;
/// use serde_json::json;
///
/// let request = SubscriptionRequest::new("eth_subscribe")
///     .param(json!("logs"))
///     .param(json!({"address": "0x8320fe7702b96808f7bbc0d4a888ed1468216cfd"}));
///
/// assert_eq!(request.params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Subscription method, e.g. `eth_subscribe` or `slotSubscribe`
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

impl SubscriptionRequest {
    /// Create a request with no parameters
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    /// Append a positional parameter
    pub fn param(mut self, value: serde_json::Value) -> Self {
        self.params.push(value);
        self
    }

    /// Build the JSON-RPC envelope sent during the handshake
    ///
    /// Parameters are always sent as an array, even when empty.
    pub fn to_rpc(&self, id: Id) -> JsonRpcRequest {
        JsonRpcRequest::new(
            self.method.clone(),
            Some(serde_json::Value::Array(self.params.clone())),
            id,
        )
    }
}

/// `params` member of a subscription notification
///
/// Exactly one of `result` and `error` is expected; a notification carrying
/// neither is treated as a `null` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionParams {
    /// Subscription the notification is addressed to
    pub subscription: SubscriptionId,
    /// Event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Node-reported error for this subscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
}
