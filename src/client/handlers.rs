//! Caller-supplied event handlers.
//!
//! Every handler receives the client as its first argument, so it can call
//! back into it (subscribe, emit, disconnect) without capturing a handle.
//!
//! | Handler | Fired on |
//! |---------|----------|
//! | `on_init` | Client constructed |
//! | `on_dispose` | `dispose()` called |
//! | `on_connection_error` | Connection error |
//! | `on_server_ping` | Server ping |
//! | `on_reconnecting` | Reconnection attempt `n` |
//! | `on_reconnecting_error` | Reconnection attempt failed |
//! | `on_reconnection_failure` | Reconnection attempts exhausted |
//! | `on_successful_reconnection` | Reconnected after `n` attempts |
//! | `on_socket_connection` | Socket connected |
//! | `on_socket_connection_error` | Socket connection failed |
//! | `on_socket_disconnection` | Socket disconnected |
//! | `on_visible_page` | Page became visible |
//! | `on_hidden_page` | Page became hidden |
//! | `on_any_subscribed_message_received` | Any subscribed channel received a message |
//!
//! # Example
//!
//! ```
//! use socket_client_manager::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .with_socket_connection(|client| println!("connected: {:?}", client.id()))
//!     .with_reconnecting(|_client, attempt| println!("attempt {attempt}"));
//!
//! assert!(handlers.on_socket_connection.is_some());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{DisconnectDetails, DisconnectReason};

use super::manager::ClientSocketManager;

// ============================================================================
// Handler Types
// ============================================================================

/// Handler taking only the client.
pub type LifecycleHandler<C> = Arc<dyn Fn(&C) + Send + Sync>;

/// Handler receiving a transport error.
pub type ErrorHandler<C> = Arc<dyn Fn(&C, &TransportError) + Send + Sync>;

/// Handler receiving a reconnection attempt number.
pub type AttemptHandler<C> = Arc<dyn Fn(&C, u32) + Send + Sync>;

/// Handler receiving the disconnection reason and details.
pub type DisconnectHandler<C> =
    Arc<dyn Fn(&C, DisconnectReason, Option<&DisconnectDetails>) + Send + Sync>;

/// Handler receiving a channel name and its payload.
pub type MessageHandler<C> = Arc<dyn Fn(&C, &str, &[Value]) + Send + Sync>;

/// Handler receiving a channel name.
pub type ChannelHandler<C> = Arc<dyn Fn(&C, &str) + Send + Sync>;

// ============================================================================
// EventHandlers
// ============================================================================

/// Optional handlers for every lifecycle event.
///
/// `C` is the client type passed to the handlers.
pub struct EventHandlers<C = ClientSocketManager> {
    /// Client constructed.
    pub on_init: Option<LifecycleHandler<C>>,
    /// `dispose()` called.
    pub on_dispose: Option<LifecycleHandler<C>>,
    /// Connection error reported by the reconnection manager.
    pub on_connection_error: Option<ErrorHandler<C>>,
    /// Server ping.
    pub on_server_ping: Option<LifecycleHandler<C>>,
    /// Reconnection attempt started.
    pub on_reconnecting: Option<AttemptHandler<C>>,
    /// Reconnection attempt failed.
    pub on_reconnecting_error: Option<ErrorHandler<C>>,
    /// Reconnection attempts exhausted.
    pub on_reconnection_failure: Option<LifecycleHandler<C>>,
    /// Reconnected.
    pub on_successful_reconnection: Option<AttemptHandler<C>>,
    /// Socket connected.
    pub on_socket_connection: Option<LifecycleHandler<C>>,
    /// Socket connection failed.
    pub on_socket_connection_error: Option<ErrorHandler<C>>,
    /// Socket disconnected.
    pub on_socket_disconnection: Option<DisconnectHandler<C>>,
    /// Page became visible.
    pub on_visible_page: Option<LifecycleHandler<C>>,
    /// Page became hidden.
    pub on_hidden_page: Option<LifecycleHandler<C>>,
    /// Any subscribed channel received a message.
    pub on_any_subscribed_message_received: Option<MessageHandler<C>>,
}

impl<C> Default for EventHandlers<C> {
    fn default() -> Self {
        Self {
            on_init: None,
            on_dispose: None,
            on_connection_error: None,
            on_server_ping: None,
            on_reconnecting: None,
            on_reconnecting_error: None,
            on_reconnection_failure: None,
            on_successful_reconnection: None,
            on_socket_connection: None,
            on_socket_connection_error: None,
            on_socket_disconnection: None,
            on_visible_page: None,
            on_hidden_page: None,
            on_any_subscribed_message_received: None,
        }
    }
}

impl<C> Clone for EventHandlers<C> {
    fn clone(&self) -> Self {
        Self {
            on_init: self.on_init.clone(),
            on_dispose: self.on_dispose.clone(),
            on_connection_error: self.on_connection_error.clone(),
            on_server_ping: self.on_server_ping.clone(),
            on_reconnecting: self.on_reconnecting.clone(),
            on_reconnecting_error: self.on_reconnecting_error.clone(),
            on_reconnection_failure: self.on_reconnection_failure.clone(),
            on_successful_reconnection: self.on_successful_reconnection.clone(),
            on_socket_connection: self.on_socket_connection.clone(),
            on_socket_connection_error: self.on_socket_connection_error.clone(),
            on_socket_disconnection: self.on_socket_disconnection.clone(),
            on_visible_page: self.on_visible_page.clone(),
            on_hidden_page: self.on_hidden_page.clone(),
            on_any_subscribed_message_received: self.on_any_subscribed_message_received.clone(),
        }
    }
}

impl<C> fmt::Debug for EventHandlers<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.configured()).finish()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl EventHandlers<ClientSocketManager> {
    /// Creates an empty handler table for [`ClientSocketManager`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C> EventHandlers<C> {
    /// Returns the names of the configured handlers.
    #[must_use]
    pub fn configured(&self) -> Vec<&'static str> {
        let slots = [
            ("on_init", self.on_init.is_some()),
            ("on_dispose", self.on_dispose.is_some()),
            ("on_connection_error", self.on_connection_error.is_some()),
            ("on_server_ping", self.on_server_ping.is_some()),
            ("on_reconnecting", self.on_reconnecting.is_some()),
            ("on_reconnecting_error", self.on_reconnecting_error.is_some()),
            ("on_reconnection_failure", self.on_reconnection_failure.is_some()),
            ("on_successful_reconnection", self.on_successful_reconnection.is_some()),
            ("on_socket_connection", self.on_socket_connection.is_some()),
            ("on_socket_connection_error", self.on_socket_connection_error.is_some()),
            ("on_socket_disconnection", self.on_socket_disconnection.is_some()),
            ("on_visible_page", self.on_visible_page.is_some()),
            ("on_hidden_page", self.on_hidden_page.is_some()),
            (
                "on_any_subscribed_message_received",
                self.on_any_subscribed_message_received.is_some(),
            ),
        ];

        slots
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl<C> EventHandlers<C> {
    /// Sets `on_init`.
    #[must_use]
    pub fn with_init(mut self, handler: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.on_init = Some(Arc::new(handler));
        self
    }

    /// Sets `on_dispose`.
    #[must_use]
    pub fn with_dispose(mut self, handler: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.on_dispose = Some(Arc::new(handler));
        self
    }

    /// Sets `on_connection_error`.
    #[must_use]
    pub fn with_connection_error(
        mut self,
        handler: impl Fn(&C, &TransportError) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_error = Some(Arc::new(handler));
        self
    }

    /// Sets `on_server_ping`.
    #[must_use]
    pub fn with_server_ping(mut self, handler: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.on_server_ping = Some(Arc::new(handler));
        self
    }

    /// Sets `on_reconnecting`.
    #[must_use]
    pub fn with_reconnecting(mut self, handler: impl Fn(&C, u32) + Send + Sync + 'static) -> Self {
        self.on_reconnecting = Some(Arc::new(handler));
        self
    }

    /// Sets `on_reconnecting_error`.
    #[must_use]
    pub fn with_reconnecting_error(
        mut self,
        handler: impl Fn(&C, &TransportError) + Send + Sync + 'static,
    ) -> Self {
        self.on_reconnecting_error = Some(Arc::new(handler));
        self
    }

    /// Sets `on_reconnection_failure`.
    #[must_use]
    pub fn with_reconnection_failure(
        mut self,
        handler: impl Fn(&C) + Send + Sync + 'static,
    ) -> Self {
        self.on_reconnection_failure = Some(Arc::new(handler));
        self
    }

    /// Sets `on_successful_reconnection`.
    #[must_use]
    pub fn with_successful_reconnection(
        mut self,
        handler: impl Fn(&C, u32) + Send + Sync + 'static,
    ) -> Self {
        self.on_successful_reconnection = Some(Arc::new(handler));
        self
    }

    /// Sets `on_socket_connection`.
    #[must_use]
    pub fn with_socket_connection(mut self, handler: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.on_socket_connection = Some(Arc::new(handler));
        self
    }

    /// Sets `on_socket_connection_error`.
    #[must_use]
    pub fn with_socket_connection_error(
        mut self,
        handler: impl Fn(&C, &TransportError) + Send + Sync + 'static,
    ) -> Self {
        self.on_socket_connection_error = Some(Arc::new(handler));
        self
    }

    /// Sets `on_socket_disconnection`.
    #[must_use]
    pub fn with_socket_disconnection(
        mut self,
        handler: impl Fn(&C, DisconnectReason, Option<&DisconnectDetails>) + Send + Sync + 'static,
    ) -> Self {
        self.on_socket_disconnection = Some(Arc::new(handler));
        self
    }

    /// Sets `on_visible_page`.
    #[must_use]
    pub fn with_visible_page(mut self, handler: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.on_visible_page = Some(Arc::new(handler));
        self
    }

    /// Sets `on_hidden_page`.
    #[must_use]
    pub fn with_hidden_page(mut self, handler: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.on_hidden_page = Some(Arc::new(handler));
        self
    }

    /// Sets `on_any_subscribed_message_received`.
    #[must_use]
    pub fn with_any_subscribed_message_received(
        mut self,
        handler: impl Fn(&C, &str, &[Value]) + Send + Sync + 'static,
    ) -> Self {
        self.on_any_subscribed_message_received = Some(Arc::new(handler));
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let handlers = EventHandlers::new();
        assert!(handlers.configured().is_empty());
        assert_eq!(format!("{handlers:?}"), "[]");
    }

    #[test]
    fn test_builder_sets_slots() {
        let handlers = EventHandlers::new()
            .with_init(|_| {})
            .with_socket_disconnection(|_, _, _| {})
            .with_any_subscribed_message_received(|_, _, _| {});

        assert_eq!(
            handlers.configured(),
            vec![
                "on_init",
                "on_socket_disconnection",
                "on_any_subscribed_message_received"
            ]
        );

        let cloned = handlers.clone();
        assert!(cloned.on_init.is_some());
        assert!(cloned.on_dispose.is_none());
    }

    #[test]
    fn test_generic_client_type() {
        let handlers = EventHandlers::<u8>::default().with_reconnecting(|client, attempt| {
            assert_eq!(u32::from(*client), attempt);
        });

        if let Some(handler) = &handlers.on_reconnecting {
            handler(&3, 3);
        }
    }
}
