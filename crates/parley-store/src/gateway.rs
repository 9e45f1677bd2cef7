//! The persistence gateway: a [`MessageStore`] plus a health flag.
//!
//! ```text
//!   start(Ok(store)) ──→ Enabled ──(any fetch/append error)──→ Disabled
//!   start(Err(_))    ──────────────────────────────────────→ Disabled
//!   disabled()       ──────────────────────────────────────→ Disabled
//! ```
//!
//! `Disabled` is terminal for the life of the gateway. There is no
//! reconnect path: once storage misbehaves, the relay carries on without
//! history rather than retrying on every message.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{MessageStore, StoreError, StoredMessage};

/// Whether the gateway still talks to its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayHealth {
    /// Calls are forwarded to the store.
    Enabled,
    /// Calls return [`StoreError::Disabled`] without touching the store.
    Disabled,
}

/// Wraps a [`MessageStore`] so that its first failure switches persistence
/// off for good instead of propagating to the relay.
///
/// Callers are expected to check [`is_enabled`](Self::is_enabled) and skip
/// persistence work entirely when it returns `false`.
pub struct PersistenceGateway<S> {
    store: Option<S>,
    enabled: AtomicBool,
}

impl<S: MessageStore> PersistenceGateway<S> {
    /// Builds a gateway from the outcome of opening the store at startup.
    ///
    /// An `Err` leaves the gateway permanently disabled; the error is
    /// logged and otherwise swallowed.
    pub fn start(opened: Result<S, StoreError>) -> Self {
        match opened {
            Ok(store) => Self::enabled(store),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "message store unavailable, continuing without history"
                );
                Self::disabled()
            }
        }
    }

    /// Builds an enabled gateway over `store`.
    pub fn enabled(store: S) -> Self {
        Self {
            store: Some(store),
            enabled: AtomicBool::new(true),
        }
    }

    /// Builds a gateway with no store at all.
    pub fn disabled() -> Self {
        Self {
            store: None,
            enabled: AtomicBool::new(false),
        }
    }

    /// Current health.
    pub fn health(&self) -> GatewayHealth {
        if self.is_enabled() {
            GatewayHealth::Enabled
        } else {
            GatewayHealth::Disabled
        }
    }

    /// Returns `true` while the gateway is [`GatewayHealth::Enabled`].
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the wrapped store, if there is one.
    pub fn backend(&self) -> Option<&S> {
        self.store.as_ref()
    }

    /// Fetches all stored messages.
    ///
    /// # Errors
    /// [`StoreError::Disabled`] if the gateway is disabled. Any store
    /// error is returned once, after disabling the gateway.
    pub async fn fetch_history(&self) -> Result<Vec<StoredMessage>, StoreError> {
        let store = self.active_store()?;
        store.fetch_history().await.inspect_err(|e| self.disable(e))
    }

    /// Appends one message.
    ///
    /// # Errors
    /// Same as [`fetch_history`](Self::fetch_history).
    pub async fn store(&self, record: StoredMessage) -> Result<(), StoreError> {
        let store = self.active_store()?;
        store.append(record).await.inspect_err(|e| self.disable(e))
    }

    fn active_store(&self) -> Result<&S, StoreError> {
        match &self.store {
            Some(store) if self.is_enabled() => Ok(store),
            _ => Err(StoreError::Disabled),
        }
    }

    /// Flips to `Disabled`. Only the first caller logs.
    fn disable(&self, cause: &StoreError) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            tracing::warn!(
                error = %cause,
                "message store failed, persistence disabled"
            );
        }
    }
}
