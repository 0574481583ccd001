//! Blockchain node subscription client
//!
//! Opens JSON-RPC subscriptions against a node's message endpoint (for
//! example `eth_subscribe` over WebSocket), routes the node's notifications
//! to a callback and keeps the subscription alive across connection drops.
//!
//! # Core Features
//!
//! - **One connection per subscription**: subscriptions never share a socket
//! - **Handshake timeout**: `subscribe` resolves with the node-assigned id or
//!   fails within a bounded time
//! - **Filtering and single-shot**: drop unwanted payloads, or close after the
//!   first accepted one
//! - **Auto-reconnection**: fixed-delay retries with bounded, unbounded or
//!   predicate-driven limits; the request is replayed on a fresh connection
//! - **Pluggable transport**: WebSocket built in, anything else via [`Transport`]
//! - **Observability**: tracing spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chainstream_client::{ReconnectSettings, StreamClient, StreamOptions};
//! use chainstream_core::SubscriptionRequest;
//! use serde_json::{json, Value};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::new("wss://node.example/ws");
//!
//!     let options = StreamOptions::<Value>::new()
//!         .on_error(|err| eprintln!("subscription failed: {}", err))
//!         .auto_reconnect(
//!             ReconnectSettings::new()
//!                 .retries(10)
//!                 .delay(Duration::from_secs(2)),
//!         );
//!
//!     let sub = client
//!         .subscribe(SubscriptionRequest::new("eth_subscribe").param(json!("newHeads")), options)
//!         .await?;
//!
//!     sub.next(|head| println!("head: {:?}", head));
//!
//!     tokio::signal::ctrl_c().await?;
//!     sub.close();
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod manager;
mod metrics;
mod notification;
mod options;
mod reconnect;
mod subscription;
mod transport;

pub use client::StreamClient;
pub use client_builder::ClientBuilder;
pub use connection_state::ConnectionState;
pub use manager::SubscriptionContext;
pub use metrics::ClientMetrics;
pub use notification::{NotificationCallback, NotificationRouter, RouteOutcome};
pub use options::{ErrorCallback, Filter, StreamOptions, DEFAULT_HANDSHAKE_TIMEOUT};
pub use reconnect::{
    decide, FailedCallback, ReconnectDecision, ReconnectSettings, Retries, RetryPredicate,
    DEFAULT_RECONNECT_DELAY,
};
pub use subscription::Subscription;
pub use transport::{
    Transport, TransportConnection, TransportEvent, TransportHandle, WsTransport,
    DEFAULT_EVENT_BUFFER,
};
