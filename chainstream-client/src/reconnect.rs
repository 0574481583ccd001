//! Reconnect policy for subscriptions that lose their connection
//!
//! When a connection that completed its handshake closes without the
//! subscriber asking for it, the policy decides what happens next:
//! - wait a fixed delay and open a fresh connection
//! - give up and invoke the `on_failed` callback
//! - do nothing beyond reporting the error (reconnection disabled)
//!
//! # Retry Limits
//!
//! - **Unbounded**: retry forever (default)
//! - **Bounded(n)**: retry while fewer than `n` attempts were made since the
//!   last successful open; a negative bound means unbounded
//! - **Predicate**: ask a caller-supplied function before every attempt
//!
//! The retry counter belongs to the subscription and is reset to zero each
//! time a connection reaches the open state.
//!
//! # Examples
//!
//! ```rust
//! use chainstream_client::{ReconnectSettings, Retries};
//! use std::time::Duration;
//!
//! // Default: unbounded retries, 1s apart
//! let default = ReconnectSettings::default();
//! assert!(matches!(default.retry_limit(), Retries::Unbounded));
//!
//! // Five attempts 250ms apart, then report failure
//! let bounded = ReconnectSettings::new()
//!     .retries(5)
//!     .delay(Duration::from_millis(250))
//!     .on_failed(|err| eprintln!("giving up: {}", err));
//! ```

use chainstream_core::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay between a connection loss and the next attempt when unset
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Decides whether another attempt may be made
pub type RetryPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Invoked once when the policy gives up
pub type FailedCallback = Arc<dyn Fn(Error) + Send + Sync>;

/// How many reconnect attempts are allowed
#[derive(Clone, Default)]
pub enum Retries {
    /// Allow up to this many attempts; negative values mean unbounded
    Bounded(i64),
    /// Always retry
    #[default]
    Unbounded,
    /// Retry while the predicate returns true
    Predicate(RetryPredicate),
}

impl Retries {
    /// Whether another attempt is permitted after `attempted` attempts
    pub fn permits(&self, attempted: u32) -> bool {
        match self {
            Retries::Bounded(limit) if *limit < 0 => true,
            Retries::Bounded(limit) => i64::from(attempted) < *limit,
            Retries::Unbounded => true,
            Retries::Predicate(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for Retries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retries::Bounded(limit) => f.debug_tuple("Bounded").field(limit).finish(),
            Retries::Unbounded => f.write_str("Unbounded"),
            Retries::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// Automatic reconnection settings
///
/// Present on a subscription's options means reconnection is enabled.
#[derive(Clone)]
pub struct ReconnectSettings {
    retries: Retries,
    delay: Duration,
    on_failed: Option<FailedCallback>,
}

impl ReconnectSettings {
    /// Unbounded retries with the default delay
    pub fn new() -> Self {
        Self {
            retries: Retries::Unbounded,
            delay: DEFAULT_RECONNECT_DELAY,
            on_failed: None,
        }
    }

    /// Limit the number of attempts; negative means unbounded
    pub fn retries(mut self, limit: i64) -> Self {
        self.retries = Retries::Bounded(limit);
        self
    }

    /// Consult `predicate` before every attempt
    pub fn retry_while<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.retries = Retries::Predicate(Arc::new(predicate));
        self
    }

    /// Set the delay between a connection loss and the next attempt
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Register the callback invoked when the policy gives up
    pub fn on_failed<F>(mut self, callback: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.on_failed = Some(Arc::new(callback));
        self
    }

    /// Configured retry limit
    pub fn retry_limit(&self) -> &Retries {
        &self.retries
    }

    /// Configured delay
    pub fn retry_delay(&self) -> Duration {
        self.delay
    }

    pub(crate) fn failed_callback(&self) -> Option<&FailedCallback> {
        self.on_failed.as_ref()
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReconnectSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectSettings")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .field("on_failed", &self.on_failed.is_some())
            .finish()
    }
}

/// Outcome of consulting the policy after an unexpected close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reconnection is not configured
    Disabled,
    /// Open a new connection after this delay
    Retry(Duration),
    /// The retry limit has been reached
    Exhausted,
}

/// Decide what to do after an unexpected close
///
/// `attempted` is the number of attempts already made since the last
/// successful open. Pure apart from calling a retry predicate.
pub fn decide(settings: Option<&ReconnectSettings>, attempted: u32) -> ReconnectDecision {
    match settings {
        None => ReconnectDecision::Disabled,
        Some(settings) if settings.retries.permits(attempted) => {
            ReconnectDecision::Retry(settings.delay)
        }
        Some(_) => ReconnectDecision::Exhausted,
    }
}
