//! Client metrics definitions
//!
//! OpenTelemetry instruments describing subscription health. They are
//! recorded through the global meter provider, so they are exported wherever
//! `chainstream_core::init_observability` pointed it.
//!
//! # Metrics Collected
//!
//! - **connection_state**: lifecycle state of the most recently updated subscription (gauge)
//! - **subscriptions_total**: handshakes by method and outcome (counter)
//! - **handshake_duration**: handshake latency (histogram)
//! - **notifications_total**: routed frames by outcome (counter)
//! - **errors_total**: errors by kind (counter)
//! - **reconnection_attempts** / **reconnection_success** / **reconnection_exhausted** (counters)
//!
//! # Examples
//!
//! ```rust,no_run
//! use chainstream_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("head-watcher");
//! metrics.record_subscription("eth_subscribe", "success", 0.012);
//! ```

use crate::connection_state::ConnectionState;
use crate::notification::RouteOutcome;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Subscription metrics
pub struct ClientMetrics {
    /// Connection state (0=closed, 1=connecting, 2=open, 3=reconnecting, 4=failed)
    pub connection_state: Gauge<i64>,
    /// Handshakes attempted
    pub subscriptions_total: Counter<u64>,
    /// Handshake duration in seconds
    pub handshake_duration: Histogram<f64>,
    /// Frames routed, by outcome
    pub notifications_total: Counter<u64>,
    /// Errors, by kind
    pub errors_total: Counter<u64>,
    /// Reconnect attempts started
    pub reconnection_attempts: Counter<u64>,
    /// Reconnect attempts that reached Open
    pub reconnection_success: Counter<u64>,
    /// Times the reconnect policy gave up
    pub reconnection_exhausted: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        // global::meter needs a 'static name
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("chainstream.client.connection.state")
                .with_description(
                    "Connection state (0=closed, 1=connecting, 2=open, 3=reconnecting, 4=failed)",
                )
                .build(),
            subscriptions_total: meter
                .u64_counter("chainstream.client.subscriptions.total")
                .with_description("Total number of subscription handshakes")
                .build(),
            handshake_duration: meter
                .f64_histogram("chainstream.client.handshake.duration")
                .with_description("Subscription handshake duration in seconds")
                .build(),
            notifications_total: meter
                .u64_counter("chainstream.client.notifications.total")
                .with_description("Total number of frames routed, by outcome")
                .build(),
            errors_total: meter
                .u64_counter("chainstream.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("chainstream.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("chainstream.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            reconnection_exhausted: meter
                .u64_counter("chainstream.client.reconnection.exhausted")
                .with_description("Total number of times reconnection was abandoned")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, method: &str, state: ConnectionState) {
        let attributes = &[KeyValue::new("method", method.to_string())];
        self.connection_state.record(state.as_gauge(), attributes);
    }

    /// Record a handshake
    pub fn record_subscription(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.subscriptions_total.add(1, attributes);
        self.handshake_duration.record(duration_secs, attributes);
    }

    /// Record a routed frame
    pub fn record_notification(&self, method: &str, outcome: RouteOutcome) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        self.notifications_total.add(1, attributes);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a reconnection attempt
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a successful reconnection
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    /// Record the policy giving up
    pub fn record_reconnection_exhausted(&self) {
        self.reconnection_exhausted.add(1, &[]);
    }
}
