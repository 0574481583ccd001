//! chainstream - JSON-RPC subscriptions for blockchain nodes
//!
//! This is the main convenience crate that re-exports the chainstream
//! sub-crates. Use it if you want a single dependency.
//!
//! # Architecture
//!
//! - **chainstream-core**: JSON-RPC types, codec, error handling, observability
//! - **chainstream-client**: subscription client with handshake timeouts,
//!   notification routing and auto-reconnection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chainstream::{ReconnectSettings, StreamClient, StreamOptions, SubscriptionRequest};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::new("ws://localhost:8546");
//!
//!     let sub = client
//!         .subscribe(
//!             SubscriptionRequest::new("eth_subscribe").param(json!("newHeads")),
//!             StreamOptions::<Value>::new().with_default_reconnect(),
//!         )
//!         .await?;
//!
//!     sub.next(|head| match head {
//!         Ok(head) => println!("new head: {}", head["number"]),
//!         Err(err) => eprintln!("notification error: {}", err),
//!     });
//!
//!     tokio::signal::ctrl_c().await?;
//!     sub.close();
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates so everything is reachable through `chainstream::`
pub use chainstream_client as client;
pub use chainstream_core as core;

// Convenience re-exports of the most commonly used types
pub use chainstream_client::{
    ClientBuilder, ConnectionState, ReconnectSettings, StreamClient, StreamOptions, Subscription,
};
pub use chainstream_core::{Error, Result, SubscriptionId, SubscriptionRequest};
