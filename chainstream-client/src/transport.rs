//! Transport capability used by the connection manager
//!
//! The manager never touches sockets directly. It asks a [`Transport`] to
//! open a connection and gets back a [`TransportConnection`]: a handle for
//! outbound frames and lifecycle control, plus a channel of inbound
//! [`TransportEvent`]s that the manager's dispatch loop drains.
//!
//! Every `open` produces an independent connection. Connections are never
//! pooled or shared between subscriptions.
//!
//! # Built-in Transport
//!
//! [`WsTransport`] speaks WebSocket through `tokio-tungstenite`. Each
//! connection runs one writer task and one reader task. The reader forwards
//! frames into a bounded channel; while that channel is full the connection
//! reports itself as paused.
//!
//! # Custom Transports
//!
//! Implement [`Transport`] and [`TransportHandle`] to run subscriptions over
//! anything that carries text frames (IPC sockets, in-memory test doubles).

use chainstream_core::{Error, Result};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Default capacity of the inbound event channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Something that happened on an open connection
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A text frame from the node
    Message(String),
    /// The connection failed (not a clean close)
    Error(Error),
    /// The connection closed
    Closed,
}

/// Control side of an open connection
pub trait TransportHandle: Send + Sync {
    /// Queue a text frame for sending
    fn send(&self, frame: String) -> Result<()>;

    /// Close the connection. Idempotent.
    fn close(&self);

    /// Whether the connection is still usable
    fn is_open(&self) -> bool;

    /// Whether inbound delivery is currently stalled by back-pressure
    fn is_paused(&self) -> bool;
}

/// A freshly opened connection
pub struct TransportConnection {
    /// Outbound frames and lifecycle control
    pub handle: Arc<dyn TransportHandle>,
    /// Inbound events, in arrival order
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens connections to a node's message endpoint
pub trait Transport: Send + Sync {
    /// Open a new, independent connection to `url`
    fn open(&self, url: &str) -> BoxFuture<'static, Result<TransportConnection>>;
}

/// WebSocket transport backed by `tokio-tungstenite`
#[derive(Debug, Clone)]
pub struct WsTransport {
    event_buffer: usize,
}

impl WsTransport {
    /// Create a WebSocket transport with the default event buffer
    pub fn new() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Set the inbound event buffer; a full buffer pauses the reader
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<TransportConnection>> {
        let url = url.to_string();
        let event_buffer = self.event_buffer;

        Box::pin(async move {
            tracing::debug!(url = %url, "Opening WebSocket connection");
            let (ws_stream, _) = connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocket(e.to_string()))?;

            let (mut sink, mut stream) = ws_stream.split();
            let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
            let (event_tx, event_rx) = mpsc::channel(event_buffer);
            let flags = Arc::new(WsFlags {
                open: AtomicBool::new(true),
                paused: AtomicBool::new(false),
            });

            // Writer: drains outbound frames until a Close frame or until the
            // handle is dropped
            tokio::spawn(async move {
                while let Some(message) = outbound_rx.recv().await {
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = sink.send(message).await {
                        tracing::debug!(error = %e, "WebSocket write failed");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            // Reader: forwards frames as events, then reports how the
            // connection ended
            let reader_flags = Arc::clone(&flags);
            tokio::spawn(async move {
                while let Some(frame) = stream.next().await {
                    let event = match frame {
                        Ok(Message::Text(text)) => TransportEvent::Message(text),
                        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                            Ok(text) => TransportEvent::Message(text),
                            Err(_) => {
                                tracing::warn!("Ignoring non UTF-8 binary frame");
                                continue;
                            }
                        },
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(e) => {
                            reader_flags.open.store(false, Ordering::SeqCst);
                            let _ = event_tx
                                .send(TransportEvent::Error(Error::WebSocket(e.to_string())))
                                .await;
                            return;
                        }
                    };

                    if forward(&event_tx, &reader_flags, event).await.is_err() {
                        // Nobody is listening any more
                        return;
                    }
                }

                reader_flags.open.store(false, Ordering::SeqCst);
                let _ = event_tx.send(TransportEvent::Closed).await;
            });

            let handle = WsHandle {
                outbound: outbound_tx,
                flags,
            };

            Ok(TransportConnection {
                handle: Arc::new(handle),
                events: event_rx,
            })
        })
    }
}

/// Push an event, flagging the connection as paused while the channel is full
async fn forward(
    tx: &mpsc::Sender<TransportEvent>,
    flags: &WsFlags,
    event: TransportEvent,
) -> std::result::Result<(), ()> {
    match tx.try_send(event) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(event)) => {
            flags.paused.store(true, Ordering::SeqCst);
            let sent = tx.send(event).await;
            flags.paused.store(false, Ordering::SeqCst);
            sent.map_err(|_| ())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(()),
    }
}

struct WsFlags {
    open: AtomicBool,
    paused: AtomicBool,
}

struct WsHandle {
    outbound: mpsc::UnboundedSender<Message>,
    flags: Arc<WsFlags>,
}

impl TransportHandle for WsHandle {
    fn send(&self, frame: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.outbound
            .send(Message::Text(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        if self.flags.open.swap(false, Ordering::SeqCst) {
            let _ = self.outbound.send(Message::Close(None));
        }
    }

    fn is_open(&self) -> bool {
        self.flags.open.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }
}
