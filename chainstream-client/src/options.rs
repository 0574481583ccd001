//! Per-subscription options
//!
//! Every field is optional and falls back to a default:
//!
//! | option           | default                      |
//! |------------------|------------------------------|
//! | `once`           | `false`                      |
//! | `filter`         | accept everything            |
//! | `timeout`        | the client's handshake timeout (5s) |
//! | `on_error`       | errors are logged only       |
//! | `auto_reconnect` | disabled                     |
//!
//! ```rust
//! use chainstream_client::{ReconnectSettings, StreamOptions};
//! use serde_json::Value;
//! use std::time::Duration;
//!
//! let options = StreamOptions::<Value>::new()
//!     .filter(|head| head["number"].as_str().is_some())
//!     .timeout(Duration::from_secs(2))
//!     .on_error(|err| eprintln!("subscription error: {}", err))
//!     .auto_reconnect(ReconnectSettings::new().retries(10));
//! ```

use crate::reconnect::ReconnectSettings;
use chainstream_core::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handshake timeout used when neither the options nor the client set one
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Notification predicate; `false` suppresses delivery
pub type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Receives errors nobody is awaiting (post-handshake failures)
pub type ErrorCallback = Arc<dyn Fn(Error) + Send + Sync>;

/// Options for a single `subscribe` call
pub struct StreamOptions<T = serde_json::Value> {
    pub(crate) once: bool,
    pub(crate) filter: Option<Filter<T>>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) auto_reconnect: Option<ReconnectSettings>,
}

impl<T> StreamOptions<T> {
    /// All defaults
    pub fn new() -> Self {
        Self {
            once: false,
            filter: None,
            timeout: None,
            on_error: None,
            auto_reconnect: None,
        }
    }

    /// Close the subscription after the first notification that passes the
    /// filter is delivered
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Only deliver notifications for which `filter` returns true
    ///
    /// Errors are never filtered.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Bound the time allowed to open the connection and receive a
    /// subscription id
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Receive errors raised after the handshake
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Enable automatic reconnection
    pub fn auto_reconnect(mut self, settings: ReconnectSettings) -> Self {
        self.auto_reconnect = Some(settings);
        self
    }

    /// Enable automatic reconnection with unbounded retries one second apart
    pub fn with_default_reconnect(self) -> Self {
        self.auto_reconnect(ReconnectSettings::default())
    }

    /// Whether the subscription closes after its first delivery
    pub fn is_once(&self) -> bool {
        self.once
    }

    /// Reconnection settings, if enabled
    pub fn reconnect_settings(&self) -> Option<&ReconnectSettings> {
        self.auto_reconnect.as_ref()
    }

    /// Effective handshake timeout given the client default
    pub fn handshake_timeout(&self, client_default: Duration) -> Duration {
        self.timeout.unwrap_or(client_default)
    }
}

impl<T> Default for StreamOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for StreamOptions<T> {
    fn clone(&self) -> Self {
        Self {
            once: self.once,
            filter: self.filter.clone(),
            timeout: self.timeout,
            on_error: self.on_error.clone(),
            auto_reconnect: self.auto_reconnect.clone(),
        }
    }
}

impl<T> fmt::Debug for StreamOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("once", &self.once)
            .field("filter", &self.filter.is_some())
            .field("timeout", &self.timeout)
            .field("on_error", &self.on_error.is_some())
            .field("auto_reconnect", &self.auto_reconnect)
            .finish()
    }
}
