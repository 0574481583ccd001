//! Subscription client for a blockchain node endpoint
//!
//! `StreamClient` only holds the endpoint URL, the transport used to reach it
//! and client-wide defaults. It carries no connection or reconnect state:
//! every `subscribe` call opens its own connection and gets its own
//! lifecycle.
//!
//! # Subscription Lifecycle
//!
//! 1. **Subscribe**: open a connection, send the request, await the id
//! 2. **Consume**: register a callback with `Subscription::next`
//! 3. **Reconnect** (optional): replay the request on a new connection
//! 4. **Close**: `Subscription::close`
//!
//! # Cloning
//!
//! `StreamClient` is cheaply cloneable; clones share the transport and
//! metrics.

use crate::manager::{establish, SessionShared, SubscriptionContext};
use crate::metrics::ClientMetrics;
use crate::options::{StreamOptions, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::subscription::Subscription;
use crate::transport::{Transport, WsTransport};
use crate::ClientBuilder;
use chainstream_core::{Result, SubscriptionRequest};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Client for node subscriptions
#[derive(Clone)]
pub struct StreamClient {
    pub(crate) url: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

impl StreamClient {
    /// Client for `url` over WebSocket with default settings
    ///
    /// Nothing is opened until `subscribe` is called.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: Arc::new(WsTransport::new()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            metrics: None,
        }
    }

    /// Start configuring a client
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    /// Node endpoint
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Handshake timeout used when the options do not set one
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Open a subscription
    ///
    /// Resolves once the node has assigned a subscription id. Handshake
    /// failures are returned here and never retried; `auto_reconnect` only
    /// applies after the subscription has been open.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTimeout` if no id arrived within the timeout
    /// - `Error::JsonRpc` if the node rejected the request
    /// - `Error::WebSocket` / `Error::ConnectionClosed` for transport failures
    ///
    /// ```rust,no_run
    /// use chainstream_client::{StreamClient, StreamOptions};
    /// use chainstream_core::SubscriptionRequest;
    /// use serde_json::{json, Value};
    ///
    /// # async fn example() -> chainstream_core::Result<()> {
    /// let client = StreamClient::new("wss://node.example/ws");
    /// let request = SubscriptionRequest::new("eth_subscribe").param(json!("newHeads"));
    ///
    /// let sub = client
    ///     .subscribe::<Value>(request, StreamOptions::new().with_default_reconnect())
    ///     .await?;
    /// sub.next(|head| println!("{:?}", head));
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(
        skip(self, request, options),
        fields(method = %request.method, url = %self.url)
    )]
    pub async fn subscribe<T>(
        &self,
        request: SubscriptionRequest,
        options: StreamOptions<T>,
    ) -> Result<Subscription<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let start = Instant::now();
        let timeout = options.handshake_timeout(self.handshake_timeout);

        tracing::info!("Subscribing");
        let result = establish(self.transport.as_ref(), &self.url, &request, timeout).await;
        let duration = start.elapsed().as_secs_f64();

        let established = match result {
            Ok(established) => established,
            Err(err) => {
                if let Some(ref m) = self.metrics {
                    m.record_subscription(&request.method, "error", duration);
                    m.record_error(err.kind());
                }
                if err.is_handshake_timeout() {
                    tracing::warn!(?timeout, "Node did not answer the subscription request");
                } else {
                    tracing::error!(error = %err, "Subscription handshake failed");
                }
                return Err(err);
            }
        };

        if let Some(ref m) = self.metrics {
            m.record_subscription(&request.method, "success", duration);
        }

        let context = SubscriptionContext {
            request,
            url: self.url.clone(),
            created_at: chrono::Utc::now(),
        };
        let shared = Arc::new(SessionShared::new(
            context,
            Arc::clone(&self.transport),
            options,
            timeout,
            self.metrics.clone(),
        ));
        shared.install(established);

        tracing::debug!(duration_secs = duration, "Subscription handshake completed");
        Ok(Subscription::new(shared))
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.url)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
