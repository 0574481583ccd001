//! Error types for chainstream
//!
//! Two error types live here:
//!
//! - **Error**: everything that can go wrong while opening, negotiating or
//!   maintaining a subscription (uses thiserror)
//! - **JsonRpcErrorData**: the JSON-RPC 2.0 error object as it appears on the wire
//!
//! # Error Taxonomy
//!
//! The subscription engine distinguishes failures by *when* they happen:
//!
//! - **Handshake failures** (`HandshakeTimeout`, `JsonRpc`, `WebSocket`,
//!   `ConnectionClosed`) are returned from `subscribe` to the caller awaiting it.
//! - **Post-handshake failures** (`JsonRpc` for notification errors, `WebSocket`,
//!   `ReconnectExhausted`, `ReconnectAttemptFailed`) are reported through the
//!   subscription's callbacks, since nobody is awaiting them.
//!
//! # Examples
//!
//! ```rust
//! use chainstream_core::{Error, JsonRpcErrorData};
//! use std::time::Duration;
//!
//! let timeout = Error::HandshakeTimeout { timeout: Duration::from_millis(50) };
//! assert!(timeout.is_handshake_timeout());
//!
//! let rpc = JsonRpcErrorData::parse_error();
//! assert_eq!(rpc.code, -32700);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for chainstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for chainstream operations
///
/// # Error Categories
///
/// - **Protocol errors**: JsonRpc, InvalidRequest
/// - **Transport errors**: WebSocket, ConnectionClosed
/// - **Processing errors**: Serialization, Internal
/// - **Lifecycle errors**: HandshakeTimeout, ReconnectExhausted, ReconnectAttemptFailed
///
/// The type is `Clone` so a single failure can be fanned out to several
/// observers (the `on_error` callback, logs, metrics).
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Error object reported by the node
    ///
    /// Either the handshake response carried an `error` member, or a
    /// notification for an active subscription did.
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// Serialization or deserialization error
    ///
    /// Raised when a request cannot be encoded, or a notification payload does
    /// not match the type the subscription was opened with.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    ///
    /// Connection refused, TLS failures, protocol violations below JSON-RPC.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid request built by the caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal condition
    #[error("Internal error: {0}")]
    Internal(String),

    /// No subscription id arrived within the handshake timeout
    ///
    /// Never retried automatically: `auto_reconnect` only protects sessions
    /// that completed a handshake at least once.
    #[error("Subscription handshake timed out after {}ms", timeout.as_millis())]
    HandshakeTimeout {
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The transport closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// The reconnect policy refused another attempt
    #[error("Reconnection abandoned after {attempts} attempt(s)")]
    ReconnectExhausted {
        /// Number of reconnect attempts made since the last successful open
        attempts: u32,
    },

    /// A scheduled reconnection reached the node but its handshake failed
    ///
    /// Reported once; a failed reconnect handshake does not schedule
    /// another attempt.
    #[error("Reconnection attempt failed: {0}")]
    ReconnectAttemptFailed(Box<Error>),
}

impl Error {
    /// Returns true for `HandshakeTimeout`
    pub fn is_handshake_timeout(&self) -> bool {
        matches!(self, Error::HandshakeTimeout { .. })
    }

    /// Returns true for errors raised by the transport rather than the node
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::WebSocket(_) | Error::ConnectionClosed)
    }

    /// Short, stable label used as a metrics attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::JsonRpc(_) => "json_rpc",
            Error::Serialization(_) => "serialization",
            Error::WebSocket(_) => "websocket",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Internal(_) => "internal",
            Error::HandshakeTimeout { .. } => "handshake_timeout",
            Error::ConnectionClosed => "connection_closed",
            Error::ReconnectExhausted { .. } => "reconnect_exhausted",
            Error::ReconnectAttemptFailed(_) => "reconnect_attempt_failed",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// JSON-RPC 2.0 error object
///
/// Appears in the `error` member of a response, and in the `params.error`
/// member of a failed subscription notification.
///
/// # Standard Error Codes
///
/// - `-32700`: Parse error
/// - `-32600`: Invalid Request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `-32000 to -32099`: Server error (implementation-defined)
///
/// # Examples
///
/// ```rust
/// use chainstream_core::JsonRpcErrorData;
/// use serde_json::json;
///
/// let error = JsonRpcErrorData::with_data(
///     -32000,
///     "Subscription limit reached",
///     json!({"limit": 16})
/// );
/// assert_eq!(error.code, -32000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create a new JSON-RPC error with code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create a parse error (-32700)
    ///
    /// Used locally when a frame received from the node is not valid JSON.
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32700] Parse error"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
