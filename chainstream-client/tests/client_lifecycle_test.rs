//! Client lifecycle integration tests
//!
//! Handshake outcomes over the mock transport, plus end-to-end runs against
//! a real WebSocket server.

mod common;

use chainstream_client::{
    ClientBuilder, ConnectionState, ReconnectSettings, StreamClient, StreamOptions,
};
use chainstream_core::{
    Error, Id, JsonRpcErrorData, JsonRpcRequest, JsonRpcResponse, Result, SubscriptionId,
    SubscriptionRequest,
};
use common::{mock_client, notification, wait_until, MockTransport, MockWsServer};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn new_heads() -> SubscriptionRequest {
    SubscriptionRequest::new("eth_subscribe").param(json!("newHeads"))
}

#[tokio::test]
async fn test_handshake_timeout() {
    let (client, mut peers) = mock_client();
    let options = StreamOptions::<Value>::new().timeout(Duration::from_millis(50));

    let started = Instant::now();
    let (result, mut peer) =
        tokio::join!(client.subscribe(new_heads(), options), peers.next_peer());

    match result {
        Err(Error::HandshakeTimeout { timeout }) => {
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("Expected handshake timeout, got {:?}", other.map(|_| ())),
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    // The request went out; the connection was torn down afterwards
    let request = peer.next_request().await;
    assert_eq!(request.method, "eth_subscribe");
    assert!(peer.closed_by_client());
}

#[tokio::test]
async fn test_unbounded_timeout_subscribes_and_reconnects() {
    let (client, mut peers) = mock_client();
    let options = StreamOptions::<Value>::new()
        .timeout(Duration::MAX)
        .auto_reconnect(ReconnectSettings::new().delay(Duration::from_millis(10)));

    let (result, first) = tokio::join!(client.subscribe(new_heads(), options), async {
        let mut peer = peers.next_peer().await;
        peer.accept(json!("0x1")).await;
        peer
    });
    let sub = result.unwrap();
    assert_eq!(sub.subscription_id(), Some(SubscriptionId::from("0x1")));

    // The reconnect handshake runs under the same timeout
    first.drop_connection().await;
    let mut second = peers.next_peer().await;
    second.accept(json!("0x2")).await;

    assert!(wait_until(|| sub.state() == ConnectionState::Open).await);
    assert_eq!(sub.subscription_id(), Some(SubscriptionId::from("0x2")));
    sub.close();
}

#[tokio::test]
async fn test_client_default_timeout_applies() {
    let (transport, mut peers) = MockTransport::new();
    let client = ClientBuilder::new("mock://node")
        .transport(transport)
        .handshake_timeout(Duration::from_millis(30))
        .build()
        .unwrap();

    let (result, _peer) = tokio::join!(
        client.subscribe::<Value>(new_heads(), StreamOptions::new()),
        peers.next_peer()
    );
    assert!(matches!(
        result,
        Err(Error::HandshakeTimeout { timeout }) if timeout == Duration::from_millis(30)
    ));
}

#[tokio::test]
async fn test_handshake_rejected() {
    let (client, mut peers) = mock_client();

    let (result, peer) = tokio::join!(
        client.subscribe::<Value>(new_heads(), StreamOptions::new()),
        async {
            let mut peer = peers.next_peer().await;
            let error = JsonRpcErrorData::new(-32602, "invalid subscription kind");
            peer.reject(error).await;
            peer
        }
    );

    match result {
        Err(Error::JsonRpc(data)) => {
            assert_eq!(data.code, -32602);
            assert_eq!(data.message, "invalid subscription kind");
        }
        other => panic!("Expected node error, got {:?}", other.map(|_| ())),
    }
    assert!(peer.closed_by_client());
}

#[tokio::test]
async fn test_open_refused() {
    let (client, peers) = mock_client();
    peers.refuse_next(1);

    let result = client
        .subscribe::<Value>(new_heads(), StreamOptions::new())
        .await;

    assert!(matches!(result, Err(Error::WebSocket(_))));
    assert_eq!(peers.opens(), 1);
}

#[tokio::test]
async fn test_closed_before_answer() {
    let (client, mut peers) = mock_client();

    let (result, _peer) = tokio::join!(
        client.subscribe::<Value>(new_heads(), StreamOptions::new()),
        async {
            let mut peer = peers.next_peer().await;
            peer.next_request().await;
            peer.drop_connection().await;
            peer
        }
    );

    assert!(matches!(result, Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn test_frames_before_answer_ignored() {
    let (client, mut peers) = mock_client();

    let (result, _peer) = tokio::join!(
        client.subscribe::<Value>(new_heads(), StreamOptions::new()),
        async {
            let mut peer = peers.next_peer().await;
            let request = peer.next_request().await;
            peer.notify("0xold", json!(1)).await;
            peer.answer(JsonRpcResponse::success(json!("0xother"), Id::Number(987_654))).await;
            peer.answer(JsonRpcResponse::success(json!("0x7"), request.id)).await;
            peer
        }
    );

    assert_eq!(result.unwrap().subscription_id(), Some(SubscriptionId::from("0x7")));
}

#[tokio::test]
async fn test_subscriptions_use_separate_connections() {
    let (client, mut peers) = mock_client();

    let (first, _a) = tokio::join!(
        client.subscribe::<Value>(new_heads(), StreamOptions::new()),
        async {
            let mut peer = peers.next_peer().await;
            peer.accept(json!("0x1")).await;
            peer
        }
    );
    let (second, _b) = tokio::join!(
        client.subscribe::<Value>(new_heads(), StreamOptions::new()),
        async {
            let mut peer = peers.next_peer().await;
            peer.accept(json!("0x2")).await;
            peer
        }
    );

    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(peers.opens(), 2);
    assert!(!first.same_subscription(&second));
    assert!(first.same_subscription(&first.clone()));

    first.close();
    assert_eq!(second.state(), ConnectionState::Open);
    second.close();
}

#[tokio::test]
async fn test_ws_subscribe_and_receive() {
    let server = MockWsServer::new().await;
    let client = StreamClient::new(server.url());

    let sub = client
        .subscribe::<Value>(new_heads(), StreamOptions::new())
        .await
        .unwrap();
    assert_eq!(sub.subscription_id(), Some(SubscriptionId::from("0x1")));
    assert!(sub.is_connection_open());

    let sent: JsonRpcRequest = serde_json::from_str(&server.recv_message().await.unwrap()).unwrap();
    assert_eq!(sent.method, "eth_subscribe");
    assert_eq!(sent.params, Some(json!(["newHeads"])));

    let (tx, mut rx) = mpsc::unbounded_channel();
    sub.next(move |item: Result<Value>| {
        let _ = tx.send(item);
    });

    server.push(notification("0x1", json!({"number": "0x1b4"})));
    let item = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.unwrap(), json!({"number": "0x1b4"}));

    sub.close();
    assert_eq!(sub.state(), ConnectionState::Closed);
    assert!(!sub.is_connection_open());

    server.shutdown().await;
}

#[tokio::test]
async fn test_ws_handshake_timeout() {
    let server = MockWsServer::with_handler(|_| None).await;
    let client = StreamClient::new(server.url());

    let options = StreamOptions::<Value>::new().timeout(Duration::from_millis(100));
    let result = client.subscribe(new_heads(), options).await;

    assert!(matches!(result, Err(Error::HandshakeTimeout { .. })));
    server.shutdown().await;
}

#[tokio::test]
async fn test_ws_unreachable_node() {
    let client = StreamClient::new("ws://127.0.0.1:9");
    let result = client
        .subscribe::<Value>(new_heads(), StreamOptions::new())
        .await;

    assert!(matches!(result, Err(Error::WebSocket(_))));
}

#[tokio::test]
async fn test_ws_reconnects_after_server_drop() {
    let server = MockWsServer::new().await;
    let client = StreamClient::new(server.url());

    let options = StreamOptions::<Value>::new()
        .auto_reconnect(ReconnectSettings::new().delay(Duration::from_millis(20)));
    let sub = client.subscribe(new_heads(), options).await.unwrap();
    assert_eq!(server.connections(), 1);

    server.drop_connections();

    assert!(wait_until(|| server.connections() == 2 && sub.state() == ConnectionState::Open).await);
    assert!(sub.is_connection_open());
    assert_eq!(sub.retries_attempted(), 0);

    sub.close();
    server.shutdown().await;
}

#[tokio::test]
async fn test_builder_rejects_empty_url() {
    let result = StreamClient::builder("").build();
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}
