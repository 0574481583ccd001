//! Subscription handle returned by `StreamClient::subscribe`
//!
//! The handle is a view over the subscription's shared state; it does not own
//! a socket. It stays the same object across reconnections, while the
//! subscription id and the connection behind it change.
//!
//! Clones refer to the same subscription. Dropping every handle does not
//! stop a live subscription; call [`Subscription::close`].

use crate::connection_state::ConnectionState;
use crate::manager::{SessionShared, SubscriptionContext};
use chainstream_core::{Result, SubscriptionId};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A live node subscription
pub struct Subscription<T = serde_json::Value> {
    shared: Arc<SessionShared<T>>,
}

impl<T> Subscription<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(shared: Arc<SessionShared<T>>) -> Self {
        Self { shared }
    }

    /// Register the callback receiving items and errors
    ///
    /// Replaces any previously registered callback. Notifications that
    /// arrive while no callback is registered are dropped.
    ///
    /// ```rust,no_run
    /// # async fn example(sub: chainstream_client::Subscription) {
    /// sub.next(|item| match item {
    ///     Ok(head) => println!("new head: {}", head["number"]),
    ///     Err(err) => eprintln!("subscription error: {}", err),
    /// });
    /// # }
    /// ```
    pub fn next<F>(&self, callback: F)
    where
        F: FnMut(Result<T>) + Send + 'static,
    {
        self.shared.register(Box::new(callback));
    }

    /// Close the subscription and its connection
    ///
    /// Idempotent. Cancels a pending reconnection; a reconnection handshake
    /// already in flight is discarded when it completes.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Node-assigned id of the current connection, if one is open
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.shared.subscription_id()
    }

    /// Whether the current connection is open
    pub fn is_connection_open(&self) -> bool {
        self.shared.is_connection_open()
    }

    /// Whether the current connection is stalled by back-pressure
    pub fn is_connection_paused(&self) -> bool {
        self.shared.is_connection_paused()
    }

    /// Lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Reconnect attempts since the last successful open
    pub fn retries_attempted(&self) -> u32 {
        self.shared.retries_attempted()
    }

    /// Request, endpoint and creation time
    pub fn context(&self) -> &SubscriptionContext {
        self.shared.context()
    }

    /// Whether two handles refer to the same subscription
    pub fn same_subscription(&self, other: &Subscription<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Subscription<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("method", &self.context().request.method)
            .field("url", &self.context().url)
            .field("subscription_id", &self.subscription_id())
            .field("state", &self.state())
            .finish()
    }
}
