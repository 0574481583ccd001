//! Client builder for transport, timeouts and observability
//!
//! The `ClientBuilder` provides a fluent API for configuring a
//! [`StreamClient`] before use. It allows you to:
//! - Swap the WebSocket transport for another [`Transport`]
//! - Set the client-wide handshake timeout
//! - Configure observability (OpenTelemetry) and metrics
//!
//! Reconnection is configured per subscription, through `StreamOptions`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use chainstream_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # fn example() -> chainstream_core::Result<()> {
//! let client = ClientBuilder::new("wss://node.example/ws")
//!     .handshake_timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! // With observability
//! let observed = ClientBuilder::new("wss://node.example/ws")
//!     .with_default_observability()
//!     .service_name("head-watcher")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::ClientMetrics;
use crate::options::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::transport::{Transport, WsTransport};
use crate::StreamClient;
use chainstream_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a StreamClient
pub struct ClientBuilder {
    url: String,
    transport: Option<Arc<dyn Transport>>,
    handshake_timeout: Duration,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    enable_metrics: bool,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            observability_config: None,
            service_name: None,
            enable_metrics: false,
        }
    }

    /// Use a custom transport instead of WebSocket
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a shared custom transport
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Handshake timeout for subscriptions whose options do not set one
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Record metrics on the global meter provider without initializing it
    ///
    /// For applications that set up OpenTelemetry themselves.
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRequest` if the URL is empty
    /// - `Error::Internal` if observability fails to initialize
    pub fn build(self) -> Result<StreamClient> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidRequest("Node URL must not be empty".to_string()));
        }

        // Initialize observability if configured
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            chainstream_core::init_observability(config.clone()).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else if self.enable_metrics {
            let name = self
                .service_name
                .unwrap_or_else(|| "chainstream".to_string());
            Some(Arc::new(ClientMetrics::new(name)))
        } else {
            None
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new()));

        tracing::debug!(url = %self.url, "Client configured");

        Ok(StreamClient {
            url: self.url,
            transport,
            handshake_timeout: self.handshake_timeout,
            metrics,
        })
    }
}
