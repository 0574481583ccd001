//! Connection state of a subscription
//!
//! A subscription outlives its connections. This module tracks where the
//! subscription is in its lifecycle and the bookkeeping the reconnect logic
//! relies on.
//!
//! # Connection States
//!
//! - **Connecting**: a transport is being opened and the handshake is running
//! - **Open**: the handshake completed, notifications flow
//! - **Reconnecting**: the connection was lost and an attempt is scheduled
//! - **Closed**: the subscriber closed the subscription (or `once` fulfilled it)
//! - **Failed**: the connection was lost and will not be restored
//!
//! # State Transitions
//!
//! ```text
//! Connecting → Open → Reconnecting → Connecting → Open ...
//!     ↓         ↓          ↓             ↓
//!   Closed / Failed (terminal)
//! ```
//!
//! # Reconnection Bookkeeping
//!
//! - the retry counter counts attempts since the last transition to Open
//! - at most one reconnect timer is pending; scheduling a new one aborts the
//!   previous one
//! - the explicitly-closed flag, once set, is never cleared

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Lifecycle state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening a transport and waiting for the subscription id
    Connecting,
    /// Handshake completed, notifications are being routed
    Open,
    /// Connection lost; a new attempt is scheduled
    Reconnecting {
        /// Attempt number since the last successful open (1-based)
        attempt: u32,
    },
    /// Closed on request
    Closed,
    /// Lost and not recoverable
    Failed,
}

impl ConnectionState {
    /// Whether the subscription will never deliver again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Gauge value (0=closed, 1=connecting, 2=open, 3=reconnecting, 4=failed)
    pub fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Closed => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Reconnecting { .. } => 3,
            ConnectionState::Failed => 4,
        }
    }
}

/// Lifecycle bookkeeping shared by a subscription's tasks
pub(crate) struct SessionControl {
    state: Mutex<ConnectionState>,
    explicitly_closed: AtomicBool,
    retries_attempted: AtomicU32,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionControl {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Connecting),
            explicitly_closed: AtomicBool::new(false),
            retries_attempted: AtomicU32::new(0),
            reconnect_timer: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Move to `next` unless already terminal; returns whether it moved
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let mut state = lock(&self.state);
        if state.is_terminal() {
            return false;
        }
        *state = next;
        true
    }

    /// Handshake completed: Open, retry counter back to zero
    pub(crate) fn opened(&self) -> bool {
        if !self.transition(ConnectionState::Open) {
            return false;
        }
        self.retries_attempted.store(0, Ordering::SeqCst);
        true
    }

    /// Set the explicitly-closed flag; true only for the first caller
    pub(crate) fn mark_explicitly_closed(&self) -> bool {
        !self.explicitly_closed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_explicitly_closed(&self) -> bool {
        self.explicitly_closed.load(Ordering::SeqCst)
    }

    pub(crate) fn retries_attempted(&self) -> u32 {
        self.retries_attempted.load(Ordering::SeqCst)
    }

    /// Count one more reconnect attempt, returning the new total
    pub(crate) fn record_attempt(&self) -> u32 {
        self.retries_attempted.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Spawn the pending reconnect timer, aborting any previous one
    ///
    /// The slot stays locked while `spawn` runs, so the new task cannot
    /// observe the slot before its own handle is stored.
    pub(crate) fn replace_timer<F>(&self, spawn: F)
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut slot = lock(&self.reconnect_timer);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(spawn());
    }

    /// The pending timer fired; forget it without aborting the running task
    pub(crate) fn timer_fired(&self) {
        lock(&self.reconnect_timer).take();
    }

    /// Abort the pending reconnect timer, if any
    pub(crate) fn cancel_timer(&self) -> bool {
        match lock(&self.reconnect_timer).take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_pending_timer(&self) -> bool {
        lock(&self.reconnect_timer).is_some()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
