//! Codec for JSON-RPC frames exchanged with the node
//!
//! Thin wrappers over serde_json that map failures onto the crate's error
//! type:
//! - invalid JSON → `Error::JsonRpc` with a `-32700` parse error
//! - well-formed JSON that is not a JSON-RPC message → `-32600` invalid request
//! - encoding failures → `Error::Serialization`
//!
//! # Examples
//!
//! ```rust
//! use chainstream_core::{codec, Id, JsonRpcMessage, JsonRpcRequest};
//!
//! let request = JsonRpcRequest::new("eth_subscribe", None, Id::Number(1));
//! let json = codec::encode_request(&request).unwrap();
//!
//! let decoded = codec::decode(&json).unwrap();
//! assert!(matches!(decoded, JsonRpcMessage::Request(_)));
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, SubscriptionParams};
use serde::Serialize;

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a single JSON-RPC message received from the node
///
/// Batches are not part of the subscription protocol; a JSON array is
/// rejected as an invalid request.
pub fn decode(data: &str) -> Result<JsonRpcMessage> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|_e| Error::JsonRpc(JsonRpcErrorData::parse_error()))?;

    if value.is_array() {
        return Err(Error::JsonRpc(JsonRpcErrorData::invalid_request(
            "Batch messages are not supported on subscription connections",
        )));
    }

    serde_json::from_value(value).map_err(|_e| {
        Error::JsonRpc(JsonRpcErrorData::invalid_request(
            "Frame is not a JSON-RPC 2.0 message",
        ))
    })
}

/// Encode a JSON-RPC request
pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

/// Extract subscription params from a notification
///
/// Returns `None` when the notification is not a subscription event (no
/// params, or params without a `subscription` member).
pub fn subscription_params(notif: &JsonRpcNotification) -> Option<SubscriptionParams> {
    let params = notif.params.as_ref()?;
    serde_json::from_value(params.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Id, SubscriptionId};
    use serde_json::json;

    #[test]
    fn test_encode_decode_request() {
        let req = JsonRpcRequest::new("eth_subscribe", Some(json!(["newHeads"])), Id::Number(1));
        let encoded = encode_request(&req).unwrap();

        match decode(&encoded).unwrap() {
            JsonRpcMessage::Request(decoded) => {
                assert_eq!(decoded.method, "eth_subscribe");
                assert_eq!(decoded.id, Id::Number(1));
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_message_kinds() {
        let msg = decode(r#"{"jsonrpc":"2.0","method":"eth_subscribe","id":1}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Request(_)));

        let msg = decode(r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{}}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));

        let msg = decode(r#"{"jsonrpc":"2.0","result":"0x1","id":1}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn test_decode_invalid_json() {
        match decode("not valid json") {
            Err(Error::JsonRpc(data)) => assert_eq!(data.code, -32700),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_empty_string() {
        assert!(matches!(decode(""), Err(Error::JsonRpc(_))));
    }

    #[test]
    fn test_decode_rejects_batch() {
        match decode(r#"[{"jsonrpc":"2.0","result":1,"id":1}]"#) {
            Err(Error::JsonRpc(data)) => assert_eq!(data.code, -32600),
            other => panic!("Expected invalid request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_rpc_object() {
        match decode(r#"{"hello":"world"}"#) {
            Err(Error::JsonRpc(data)) => assert_eq!(data.code, -32600),
            other => panic!("Expected invalid request, got {:?}", other),
        }
    }

    #[test]
    fn test_subscription_params_extraction() {
        let notif = JsonRpcNotification::new(
            "eth_subscription",
            Some(json!({"subscription": "0x1", "result": {"value": 20}})),
        );
        let params = subscription_params(&notif).unwrap();

        assert_eq!(params.subscription, SubscriptionId::from("0x1"));
        assert_eq!(params.result, Some(json!({"value": 20})));
    }

    #[test]
    fn test_subscription_params_absent() {
        let notif = JsonRpcNotification::new("system_health", Some(json!({"peers": 3})));
        assert!(subscription_params(&notif).is_none());

        let bare = JsonRpcNotification::new("ping", None);
        assert!(subscription_params(&bare).is_none());
    }
}
