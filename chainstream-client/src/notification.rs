//! Notification routing for a single subscription
//!
//! Every text frame arriving on a subscription's connection passes through
//! its [`NotificationRouter`]:
//!
//! 1. Frames that are not JSON-RPC messages become errors for the callback.
//! 2. Notifications addressed to another subscription id are ignored.
//! 3. `params.error` becomes an error for the callback.
//! 4. `params.result` is decoded into the subscription's item type, run
//!    through the filter and handed to the callback.
//!
//! Errors always bypass the filter. With `once` set, the first accepted
//! notification fulfils the subscription and everything after it is dropped.
//!
//! There is no queue: a notification that arrives while no callback is
//! registered is dropped.
//!
//! # Re-entrancy
//!
//! The callback is taken out of its slot while it runs and put back
//! afterwards, unless a new one was registered in the meantime. A callback may
//! therefore call `Subscription::next` or `Subscription::close` on its own
//! subscription.

use crate::options::Filter;
use chainstream_core::{codec, Error, JsonRpcMessage, Result, SubscriptionId};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Consumer callback for a subscription's items and errors
pub type NotificationCallback<T> = Box<dyn FnMut(Result<T>) + Send>;

/// What the router did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An item reached the callback
    Delivered,
    /// An item reached the callback and fulfilled a `once` subscription
    Fulfilled,
    /// The filter rejected the item
    Filtered,
    /// An error reached the callback
    ErrorDelivered,
    /// Nothing was registered to receive the item or error
    Dropped,
    /// Not addressed to this subscription, or arrived after fulfilment
    Ignored,
}

impl RouteOutcome {
    /// Metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Delivered => "delivered",
            RouteOutcome::Fulfilled => "fulfilled",
            RouteOutcome::Filtered => "filtered",
            RouteOutcome::ErrorDelivered => "error",
            RouteOutcome::Dropped => "dropped",
            RouteOutcome::Ignored => "ignored",
        }
    }
}

/// Routes frames from one connection to one consumer callback
pub struct NotificationRouter<T> {
    callback: Mutex<Option<NotificationCallback<T>>>,
    filter: Option<Filter<T>>,
    once: bool,
    fulfilled: AtomicBool,
}

impl<T: DeserializeOwned> NotificationRouter<T> {
    /// Create a router with an optional filter
    pub fn new(filter: Option<Filter<T>>, once: bool) -> Self {
        Self {
            callback: Mutex::new(None),
            filter,
            once,
            fulfilled: AtomicBool::new(false),
        }
    }

    /// Register the consumer callback, replacing any previous one
    pub fn register(&self, callback: NotificationCallback<T>) {
        *self.slot() = Some(callback);
    }

    /// Whether a `once` subscription has delivered its item
    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled.load(Ordering::SeqCst)
    }

    /// Route one inbound frame for the subscription currently known as `id`
    pub fn route(&self, frame: &str, id: &SubscriptionId) -> RouteOutcome {
        if self.is_fulfilled() {
            return RouteOutcome::Ignored;
        }

        let notification = match codec::decode(frame) {
            Ok(JsonRpcMessage::Notification(notification)) => notification,
            Ok(JsonRpcMessage::Response(response)) => {
                tracing::debug!(
                    id = %response.id,
                    "Ignoring response on subscription connection"
                );
                return RouteOutcome::Ignored;
            }
            Ok(JsonRpcMessage::Request(request)) => {
                tracing::debug!(
                    method = %request.method,
                    "Ignoring request on subscription connection"
                );
                return RouteOutcome::Ignored;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Malformed frame on subscription connection");
                return self.deliver_error(err);
            }
        };

        let Some(params) = codec::subscription_params(&notification) else {
            tracing::debug!(
                method = %notification.method,
                "Ignoring notification without subscription params"
            );
            return RouteOutcome::Ignored;
        };

        if params.subscription != *id {
            tracing::trace!(
                expected = %id,
                received = %params.subscription,
                "Ignoring notification for another subscription"
            );
            return RouteOutcome::Ignored;
        }

        if let Some(error) = params.error {
            return self.deliver_error(Error::JsonRpc(error));
        }

        let payload = params.result.unwrap_or(serde_json::Value::Null);
        let item: T = match serde_json::from_value(payload) {
            Ok(item) => item,
            Err(err) => return self.deliver_error(Error::Serialization(err.to_string())),
        };

        if let Some(filter) = &self.filter {
            if !filter(&item) {
                return RouteOutcome::Filtered;
            }
        }

        if !self.invoke(Ok(item)) {
            return RouteOutcome::Dropped;
        }

        if self.once {
            self.fulfilled.store(true, Ordering::SeqCst);
            RouteOutcome::Fulfilled
        } else {
            RouteOutcome::Delivered
        }
    }

    /// Hand an error to the callback, bypassing the filter
    pub fn deliver_error(&self, error: Error) -> RouteOutcome {
        if self.invoke(Err(error)) {
            RouteOutcome::ErrorDelivered
        } else {
            RouteOutcome::Dropped
        }
    }

    fn invoke(&self, item: Result<T>) -> bool {
        let Some(mut callback) = self.slot().take() else {
            return false;
        };

        callback(item);

        let mut slot = self.slot();
        if slot.is_none() {
            *slot = Some(callback);
        }
        true
    }

    fn slot(&self) -> MutexGuard<'_, Option<NotificationCallback<T>>> {
        // The lock is never held across a callback, so poisoning cannot leave
        // the slot half-updated
        self.callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
