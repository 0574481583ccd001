//! Common test utilities for chainstream-client integration tests
//!
//! Two kinds of node doubles:
//!
//! - [`MockTransport`]: in-memory transport. Every `open` hands the test a
//!   [`MockPeer`] that reads what the client sent, answers handshakes, pushes
//!   notifications and drops the connection on demand.
//! - [`MockWsServer`]: a real WebSocket server on localhost for end-to-end
//!   tests of the built-in transport.

#![allow(dead_code)]

use chainstream_client::{
    StreamClient, Transport, TransportConnection, TransportEvent, TransportHandle,
};
use chainstream_core::{codec, Error, JsonRpcErrorData, JsonRpcRequest, JsonRpcResponse, Result};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// How long helpers wait for the client before failing a test
pub const STEP_TIMEOUT: Duration = Duration::from_secs(2);

/// Notification frame addressed to `subscription`
pub fn notification(subscription: &str, result: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {"subscription": subscription, "result": result}
    })
    .to_string()
}

/// Notification frame carrying a node error for `subscription`
pub fn error_notification(subscription: &str, code: i32, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {"subscription": subscription, "error": {"code": code, "message": message}}
    })
    .to_string()
}

struct PeerFlags {
    open: AtomicBool,
    paused: AtomicBool,
    closed_by_client: AtomicBool,
}

struct MockHandle {
    sent: mpsc::UnboundedSender<String>,
    flags: Arc<PeerFlags>,
}

impl TransportHandle for MockHandle {
    fn send(&self, frame: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.sent.send(frame).map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        self.flags.open.store(false, Ordering::SeqCst);
        self.flags.closed_by_client.store(true, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.flags.open.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }
}

/// The node's side of one mock connection
pub struct MockPeer {
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<TransportEvent>,
    flags: Arc<PeerFlags>,
}

impl MockPeer {
    /// Next frame the client sent, parsed as a request
    pub async fn next_request(&mut self) -> JsonRpcRequest {
        let frame = tokio::time::timeout(STEP_TIMEOUT, self.sent.recv())
            .await
            .expect("client sent nothing")
            .expect("client handle dropped");
        serde_json::from_str(&frame).expect("client sent an invalid request")
    }

    /// Read the subscription request and answer it with `subscription_id`
    pub async fn accept(&mut self, subscription_id: Value) -> JsonRpcRequest {
        let request = self.next_request().await;
        self.answer(JsonRpcResponse::success(subscription_id, request.id.clone())).await;
        request
    }

    /// Read the subscription request and answer it with an error
    pub async fn reject(&mut self, error: JsonRpcErrorData) -> JsonRpcRequest {
        let request = self.next_request().await;
        self.answer(JsonRpcResponse::error(error, request.id.clone())).await;
        request
    }

    /// Deliver a handshake response
    pub async fn answer(&self, response: JsonRpcResponse) {
        let frame = codec::encode(&response).expect("response encodes");
        self.push(frame).await;
    }

    /// Deliver a raw frame to the client
    pub async fn push(&self, frame: String) {
        let _ = self.events.send(TransportEvent::Message(frame)).await;
    }

    /// Deliver a notification for `subscription`
    pub async fn notify(&self, subscription: &str, result: Value) {
        self.push(notification(subscription, result)).await;
    }

    /// Close the connection from the node's side
    pub async fn drop_connection(&self) {
        self.flags.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Closed).await;
    }

    /// Fail the connection with a transport error
    pub async fn fail(&self, reason: &str) {
        self.flags.open.store(false, Ordering::SeqCst);
        let _ = self
            .events
            .send(TransportEvent::Error(Error::WebSocket(reason.to_string())))
            .await;
    }

    /// Simulate back-pressure on the client's side of the connection
    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    /// Whether the client closed this connection
    pub fn closed_by_client(&self) -> bool {
        self.flags.closed_by_client.load(Ordering::SeqCst)
    }
}

/// In-memory transport handing each opened connection to the test
pub struct MockTransport {
    peers: mpsc::UnboundedSender<MockPeer>,
    refuse_next: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
}

/// Test-side receiver of connections opened through a [`MockTransport`]
pub struct PeerQueue {
    peers: mpsc::UnboundedReceiver<MockPeer>,
    refuse_next: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> (Self, PeerQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let refuse_next = Arc::new(AtomicUsize::new(0));
        let opens = Arc::new(AtomicUsize::new(0));

        let transport = Self {
            peers: tx,
            refuse_next: Arc::clone(&refuse_next),
            opens: Arc::clone(&opens),
        };
        let queue = PeerQueue {
            peers: rx,
            refuse_next,
            opens,
        };
        (transport, queue)
    }
}

impl Transport for MockTransport {
    fn open(&self, _url: &str) -> BoxFuture<'static, Result<TransportConnection>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Box::pin(async { Err(Error::WebSocket("connection refused".to_string())) });
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(64);
        let flags = Arc::new(PeerFlags {
            open: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            closed_by_client: AtomicBool::new(false),
        });

        let _ = self.peers.send(MockPeer {
            sent: sent_rx,
            events: events_tx,
            flags: Arc::clone(&flags),
        });

        let handle = MockHandle {
            sent: sent_tx,
            flags,
        };
        Box::pin(async move {
            Ok(TransportConnection {
                handle: Arc::new(handle),
                events: events_rx,
            })
        })
    }
}

impl PeerQueue {
    /// Wait for the client to open a connection
    pub async fn next_peer(&mut self) -> MockPeer {
        tokio::time::timeout(STEP_TIMEOUT, self.peers.recv())
            .await
            .expect("client opened no connection")
            .expect("transport dropped")
    }

    /// The next connection opened within `within`, if any
    pub async fn try_next_peer(&mut self, within: Duration) -> Option<MockPeer> {
        tokio::time::timeout(within, self.peers.recv())
            .await
            .ok()
            .flatten()
    }

    /// Refuse the next `count` opens
    pub fn refuse_next(&self, count: usize) {
        self.refuse_next.store(count, Ordering::SeqCst);
    }

    /// Total opens requested, refused ones included
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

/// Client over a fresh mock transport
pub fn mock_client() -> (StreamClient, PeerQueue) {
    let (transport, peers) = MockTransport::new();
    let client = StreamClient::builder("mock://node")
        .transport(transport)
        .build()
        .expect("client builds");
    (client, peers)
}

/// Poll `condition` until it holds or the step timeout elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[derive(Clone)]
enum ServerCommand {
    Push(String),
    DropAll,
}

/// Mock WebSocket node
///
/// Answers every request through the handler and can push frames to, or
/// drop, every open connection.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<ServerCommand>,
    message_rx: Mutex<mpsc::Receiver<String>>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Node that answers every request with subscription id `"0x1"`
    pub async fn new() -> Self {
        Self::with_handler(|frame| {
            let request: JsonRpcRequest = serde_json::from_str(&frame).ok()?;
            codec::encode(&JsonRpcResponse::success(json!("0x1"), request.id)).ok()
        })
        .await
    }

    /// Node answering requests with `handler`; `None` sends nothing back
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::channel::<String>(100);
        let (commands, _) = broadcast::channel::<ServerCommand>(64);
        let connections = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let server_commands = commands.clone();
        let server_connections = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let msg_tx = msg_tx.clone();
                        let handler = Arc::clone(&handler);
                        let mut commands = server_commands.subscribe();
                        server_connections.fetch_add(1, Ordering::SeqCst);

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    frame = read.next() => match frame {
                                        Some(Ok(Message::Text(text))) => {
                                            let _ = msg_tx.send(text.clone()).await;
                                            if let Some(reply) = handler(text) {
                                                if write.send(Message::Text(reply)).await.is_err() {
                                                    break;
                                                }
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                        Some(Ok(_)) => {}
                                    },
                                    command = commands.recv() => match command {
                                        Ok(ServerCommand::Push(frame)) => {
                                            if write.send(Message::Text(frame)).await.is_err() {
                                                break;
                                            }
                                        }
                                        Ok(ServerCommand::DropAll) | Err(_) => {
                                            let _ = write.send(Message::Close(None)).await;
                                            break;
                                        }
                                    },
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            commands,
            message_rx: Mutex::new(msg_rx),
            connections,
        }
    }

    /// WebSocket URL of the server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push a frame to every open connection
    pub fn push(&self, frame: String) {
        let _ = self.commands.send(ServerCommand::Push(frame));
    }

    /// Close every open connection from the server side
    pub fn drop_connections(&self) {
        let _ = self.commands.send(ServerCommand::DropAll);
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next frame received from any client
    pub async fn recv_message(&self) -> Option<String> {
        tokio::time::timeout(STEP_TIMEOUT, self.message_rx.lock().await.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting connections
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
