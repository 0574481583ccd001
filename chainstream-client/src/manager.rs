//! Connection manager: handshake, dispatch and reconnection for one subscription
//!
//! Each subscription owns a [`SessionShared`] that survives its connections.
//! A connection goes through:
//!
//! 1. **Handshake**: open a transport, send the subscription request, wait
//!    for the response carrying the subscription id (bounded by the timeout)
//! 2. **Dispatch**: one task drains the connection's events and feeds frames
//!    to the notification router
//! 3. **Loss**: an unexpected close or transport error consults the reconnect
//!    policy, which schedules a new connection, gives up, or reports the error
//!
//! Every reconnection opens a brand new transport and replays the original
//! request verbatim. Subscriptions never share a connection.
//!
//! # Reconnect Accounting
//!
//! A reconnect attempt whose transport fails to open, or closes before the
//! node answers the handshake, counts as another unexpected close and goes
//! back through the policy. An attempt the node answers with an error (or
//! never answers within the timeout) is reported as
//! `Error::ReconnectAttemptFailed` and ends the subscription.

use crate::connection_state::{ConnectionState, SessionControl};
use crate::metrics::ClientMetrics;
use crate::notification::{NotificationCallback, NotificationRouter, RouteOutcome};
use crate::options::StreamOptions;
use crate::reconnect::{self, ReconnectDecision};
use crate::transport::{Transport, TransportConnection, TransportEvent, TransportHandle};
use chainstream_core::{
    codec, Error, Id, JsonRpcMessage, Result, SubscriptionId, SubscriptionRequest,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Request ids for handshakes; unique per process
static NEXT_REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Diagnostic snapshot of how a subscription was created
#[derive(Debug, Clone)]
pub struct SubscriptionContext {
    /// The request replayed on every (re)connection
    pub request: SubscriptionRequest,
    /// Node endpoint
    pub url: String,
    /// When `subscribe` was called
    pub created_at: DateTime<Utc>,
}

/// The connection currently serving a subscription
#[derive(Clone)]
pub(crate) struct LiveConnection {
    pub(crate) subscription_id: SubscriptionId,
    pub(crate) handle: Arc<dyn TransportHandle>,
}

/// A connection whose handshake completed
pub(crate) struct Established {
    live: LiveConnection,
    events: mpsc::Receiver<TransportEvent>,
}

/// Open a transport and run the subscription handshake
///
/// The whole exchange (open plus response) is bounded by `timeout`. A timeout
/// too large to express as a deadline (such as `Duration::MAX`) leaves the
/// exchange unbounded. On any failure the transport, if it was opened, is
/// closed before returning.
#[tracing::instrument(skip(transport, request), fields(method = %request.method))]
pub(crate) async fn establish(
    transport: &dyn Transport,
    url: &str,
    request: &SubscriptionRequest,
    timeout: Duration,
) -> Result<Established> {
    let deadline = Instant::now().checked_add(timeout);

    let TransportConnection { handle, mut events } =
        match before(deadline, transport.open(url)).await {
            Some(opened) => opened?,
            None => return Err(Error::HandshakeTimeout { timeout }),
        };

    let id = Id::Number(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed));
    let answered = before(deadline, handshake(handle.as_ref(), &mut events, request, id)).await;

    match answered {
        Some(Ok(subscription_id)) => Ok(Established {
            live: LiveConnection {
                subscription_id,
                handle,
            },
            events,
        }),
        Some(Err(err)) => {
            handle.close();
            Err(err)
        }
        None => {
            handle.close();
            Err(Error::HandshakeTimeout { timeout })
        }
    }
}

/// Await `future` until `deadline`; `None` when the deadline passed first
async fn before<F: Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

/// Send the request and wait for the response with the matching id
async fn handshake(
    handle: &dyn TransportHandle,
    events: &mut mpsc::Receiver<TransportEvent>,
    request: &SubscriptionRequest,
    id: Id,
) -> Result<SubscriptionId> {
    let frame = codec::encode_request(&request.to_rpc(id.clone()))?;
    handle.send(frame)?;
    tracing::debug!(id = %id, "Subscription request sent, waiting for id");

    while let Some(event) = events.recv().await {
        let text = match event {
            TransportEvent::Message(text) => text,
            TransportEvent::Error(err) => return Err(err),
            TransportEvent::Closed => return Err(Error::ConnectionClosed),
        };

        match codec::decode(&text) {
            Ok(JsonRpcMessage::Response(response)) if response.id == id => {
                if let Some(error) = response.error {
                    return Err(Error::JsonRpc(error));
                }
                let result = response.result.unwrap_or(serde_json::Value::Null);
                return serde_json::from_value(result).map_err(|e| {
                    Error::Serialization(format!("Invalid subscription id: {}", e))
                });
            }
            Ok(_) => tracing::debug!("Ignoring frame received before subscription id"),
            Err(err) => tracing::warn!(error = %err, "Malformed frame during handshake"),
        }
    }

    Err(Error::ConnectionClosed)
}

/// State shared by a subscription handle and its background tasks
pub(crate) struct SessionShared<T> {
    context: SubscriptionContext,
    transport: Arc<dyn Transport>,
    options: StreamOptions<T>,
    timeout: Duration,
    router: NotificationRouter<T>,
    control: SessionControl,
    live: Mutex<Option<LiveConnection>>,
    closed: watch::Sender<bool>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl<T> SessionShared<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(
        context: SubscriptionContext,
        transport: Arc<dyn Transport>,
        options: StreamOptions<T>,
        timeout: Duration,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let router = NotificationRouter::new(options.filter.clone(), options.once);
        let (closed, _) = watch::channel(false);

        Self {
            context,
            transport,
            options,
            timeout,
            router,
            control: SessionControl::new(),
            live: Mutex::new(None),
            closed,
            metrics,
        }
    }

    pub(crate) fn context(&self) -> &SubscriptionContext {
        &self.context
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.control.state()
    }

    pub(crate) fn retries_attempted(&self) -> u32 {
        self.control.retries_attempted()
    }

    pub(crate) fn register(&self, callback: NotificationCallback<T>) {
        self.router.register(callback);
    }

    pub(crate) fn subscription_id(&self) -> Option<SubscriptionId> {
        self.live()
            .as_ref()
            .map(|live| live.subscription_id.clone())
    }

    pub(crate) fn is_connection_open(&self) -> bool {
        self.live()
            .as_ref()
            .map_or(false, |live| live.handle.is_open())
    }

    pub(crate) fn is_connection_paused(&self) -> bool {
        self.live()
            .as_ref()
            .map_or(false, |live| live.handle.is_paused())
    }

    /// Make `established` the live connection and start dispatching it
    pub(crate) fn install(self: &Arc<Self>, established: Established) {
        let Established { live, events } = established;

        if !self.control.opened() {
            live.handle.close();
            return;
        }
        *self.live() = Some(live.clone());
        self.record_state(ConnectionState::Open);

        tracing::info!(
            method = %self.context.request.method,
            subscription_id = %live.subscription_id,
            "Subscription open"
        );

        tokio::spawn(Arc::clone(self).dispatch(live, events));
    }

    /// Close on request. Idempotent; no reconnection follows.
    pub(crate) fn close(&self) {
        if !self.control.mark_explicitly_closed() {
            return;
        }
        self.closed.send_replace(true);
        if self.control.has_pending_timer() {
            tracing::debug!("Cancelling pending reconnection");
        }
        self.control.cancel_timer();

        if self.control.transition(ConnectionState::Closed) {
            self.record_state(ConnectionState::Closed);
        }
        let live = self.live().take();
        if let Some(live) = live {
            live.handle.close();
        }

        tracing::info!(method = %self.context.request.method, "Subscription closed");
    }

    async fn dispatch(
        self: Arc<Self>,
        live: LiveConnection,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        let mut closed = self.closed.subscribe();

        loop {
            if self.control.is_explicitly_closed() {
                break;
            }

            let event = tokio::select! {
                _ = closed.changed() => break,
                event = events.recv() => event,
            };

            match event {
                Some(TransportEvent::Message(text)) => {
                    let outcome = self.router.route(&text, &live.subscription_id);
                    if let Some(ref m) = self.metrics {
                        m.record_notification(&self.context.request.method, outcome);
                    }
                    if outcome == RouteOutcome::Fulfilled {
                        tracing::debug!("Single-shot subscription fulfilled");
                        self.close();
                        break;
                    }
                }
                Some(TransportEvent::Error(err)) => {
                    self.connection_lost(&live, Some(err));
                    return;
                }
                Some(TransportEvent::Closed) | None => {
                    self.connection_lost(&live, None);
                    return;
                }
            }
        }

        // Closed on request. A close racing with install can leave this
        // connection in the slot.
        self.live().take();
        live.handle.close();
    }

    fn connection_lost(self: &Arc<Self>, live: &LiveConnection, cause: Option<Error>) {
        if self.control.is_explicitly_closed() {
            return;
        }
        self.live().take();

        match &cause {
            Some(err) => tracing::warn!(
                subscription_id = %live.subscription_id,
                error = %err,
                "Subscription connection failed"
            ),
            None => tracing::warn!(
                subscription_id = %live.subscription_id,
                "Subscription connection closed unexpectedly"
            ),
        }
        if let Some(ref m) = self.metrics {
            m.record_error(cause.as_ref().map_or("connection_closed", Error::kind));
        }

        self.after_unexpected_close(cause);
    }

    /// Consult the reconnect policy
    fn after_unexpected_close(self: &Arc<Self>, cause: Option<Error>) {
        let settings = self.options.auto_reconnect.as_ref();
        let attempted = self.control.retries_attempted();

        match reconnect::decide(settings, attempted) {
            ReconnectDecision::Retry(delay) => {
                let attempt = self.control.record_attempt();
                if !self
                    .control
                    .transition(ConnectionState::Reconnecting { attempt })
                {
                    return;
                }
                self.record_state(ConnectionState::Reconnecting { attempt });

                tracing::info!(
                    attempt = attempt,
                    delay = ?delay,
                    "Scheduling reconnection"
                );
                self.schedule_reconnect(delay);
            }
            ReconnectDecision::Exhausted => {
                tracing::error!(
                    attempts = attempted,
                    "Reconnection abandoned (retry limit reached)"
                );
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_exhausted();
                }
                if !self.fail() {
                    return;
                }

                let err = Error::ReconnectExhausted {
                    attempts: attempted,
                };
                match settings.and_then(|s| s.failed_callback()) {
                    Some(on_failed) => on_failed(err),
                    None => self.report_error(err),
                }
            }
            ReconnectDecision::Disabled => {
                tracing::info!("No reconnection enabled, closing subscription");
                if self.fail() {
                    self.report_error(cause.unwrap_or(Error::ConnectionClosed));
                }
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, delay: Duration) {
        let shared = Arc::clone(self);
        self.control.replace_timer(move || {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shared.reconnect().await;
            })
        });
    }

    async fn reconnect(self: Arc<Self>) {
        self.control.timer_fired();

        if self.control.is_explicitly_closed() || self.control.state().is_terminal() {
            tracing::debug!("Reconnection cancelled");
            return;
        }
        if !self.control.transition(ConnectionState::Connecting) {
            return;
        }
        self.record_state(ConnectionState::Connecting);
        if let Some(ref m) = self.metrics {
            m.record_reconnection_attempt();
        }

        tracing::info!(
            url = %self.context.url,
            attempt = self.control.retries_attempted(),
            "Reconnecting"
        );

        let result = establish(
            self.transport.as_ref(),
            &self.context.url,
            &self.context.request,
            self.timeout,
        )
        .await;

        match result {
            Ok(established) => {
                if self.control.is_explicitly_closed() {
                    tracing::debug!(
                        "Subscription closed during reconnection, discarding connection"
                    );
                    established.live.handle.close();
                    return;
                }
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_success();
                }
                tracing::info!(
                    subscription_id = %established.live.subscription_id,
                    "Reconnected successfully"
                );
                self.install(established);
            }
            Err(err) if err.is_transport() => {
                tracing::warn!(error = %err, "Reconnection failed");
                if let Some(ref m) = self.metrics {
                    m.record_error("reconnection");
                }
                if !self.control.is_explicitly_closed() {
                    self.after_unexpected_close(Some(err));
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Reconnection handshake failed");
                if self.control.is_explicitly_closed() {
                    return;
                }
                if self.fail() {
                    self.report_error(Error::ReconnectAttemptFailed(Box::new(err)));
                }
            }
        }
    }

    /// Enter Failed; true only for the caller that made the transition
    fn fail(&self) -> bool {
        if !self.control.transition(ConnectionState::Failed) {
            return false;
        }
        self.control.cancel_timer();
        self.record_state(ConnectionState::Failed);
        true
    }

    fn report_error(&self, err: Error) {
        if let Some(ref m) = self.metrics {
            m.record_error(err.kind());
        }
        match &self.options.on_error {
            Some(on_error) => on_error(err),
            None => tracing::error!(error = %err, "Unhandled subscription error"),
        }
    }

    fn record_state(&self, state: ConnectionState) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(&self.context.request.method, state);
        }
    }

    fn live(&self) -> MutexGuard<'_, Option<LiveConnection>> {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
