// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitor.
//!
//! Normalizes the platform's reachability signal into a single "is the backend
//! reachable" boolean and fans out changes. The monitor fails open: an unknown
//! or ambiguous signal counts as connected, so the queue keeps trying to sync
//! instead of waiting forever on a signal that never arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::observer::{Listeners, SubscriptionId};

/// A raw reachability event from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkState {
    /// The device reports a network link.
    pub is_connected: bool,
    /// Whether the internet is reachable over that link, if known.
    pub is_internet_reachable: Option<bool>,
}

impl NetworkState {
    /// A state with no usable information.
    pub fn unknown() -> Self {
        NetworkState {
            is_connected: true,
            is_internet_reachable: None,
        }
    }

    pub fn reachable() -> Self {
        NetworkState {
            is_connected: true,
            is_internet_reachable: Some(true),
        }
    }

    /// A link is up but the internet is explicitly unreachable.
    pub fn unreachable() -> Self {
        NetworkState {
            is_connected: true,
            is_internet_reachable: Some(false),
        }
    }

    pub fn disconnected() -> Self {
        NetworkState {
            is_connected: false,
            is_internet_reachable: None,
        }
    }

    /// Connected means a link exists and the internet is not explicitly unreachable.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable != Some(false)
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Tracks the current connectivity and notifies subscribers on transitions.
///
/// Listeners must not call [`ConnectivityMonitor::observe`] or
/// [`ConnectivityMonitor::subscribe`] themselves; both are serialized and a
/// re-entrant call would block.
pub struct ConnectivityMonitor {
    connected: AtomicBool,
    update: Mutex<()>,
    listeners: Listeners<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor that starts out connected.
    pub fn new() -> Self {
        Self::with_state(true)
    }

    pub fn with_state(connected: bool) -> Self {
        ConnectivityMonitor {
            connected: AtomicBool::new(connected),
            update: Mutex::new(()),
            listeners: Listeners::new(),
        }
    }

    /// Last known state. Never blocks.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Feeds a raw platform event. Returns true if the connected state flipped.
    pub fn observe(&self, state: NetworkState) -> bool {
        let online = state.is_online();
        let _guard = self.update.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.connected.swap(online, Ordering::AcqRel);
        if previous == online {
            return false;
        }
        tracing::info!(
            "connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        self.listeners.notify(&online);
        true
    }

    /// Feeds a signal that is already a plain boolean.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.observe(NetworkState {
            is_connected: connected,
            is_internet_reachable: None,
        })
    }

    /// Subscribes to transitions. The listener is called once right away with
    /// the current state, then on every flip.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let forward = Arc::clone(&listener);
        // Same lock as `observe`, so no flip lands between registration and
        // the first call.
        let _guard = self.update.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.listeners.add(Arc::new(move |online: &bool| forward(*online)));
        listener(self.is_connected());
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("connected", &self.is_connected())
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
