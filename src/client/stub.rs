//! No-op client for tests and contexts without a network.
//!
//! [`ClientSocketManagerStub`] mirrors the public surface of
//! [`ClientSocketManager`](super::ClientSocketManager) but opens no
//! connection. It tracks only the connected and disposed flags and fires the
//! connection handlers when [`connect`](ClientSocketManagerStub::connect) and
//! [`disconnect`](ClientSocketManagerStub::disconnect) are called.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::transport::DisconnectReason;

use super::handlers::EventHandlers;
use super::subscription::SubscribeOptions;

// ============================================================================
// Constants
// ============================================================================

/// Session id reported while the stub is connected.
pub const STUB_SESSION_ID: &str = "__id__";

// ============================================================================
// Types
// ============================================================================

/// Handler table for [`ClientSocketManagerStub`].
pub type StubEventHandlers = EventHandlers<ClientSocketManagerStub>;

#[derive(Default)]
struct StubState {
    handlers: StubEventHandlers,
    connected: bool,
    disposed: bool,
}

// ============================================================================
// ClientSocketManagerStub
// ============================================================================

/// Client stand-in that never touches the network.
///
/// # Example
///
/// ```
/// use socket_client_manager::{ClientSocketManagerStub, StubEventHandlers};
///
/// let stub = ClientSocketManagerStub::new(
///     "http://localhost",
///     StubEventHandlers::default().with_socket_connection(|client| {
///         assert_eq!(client.id().as_deref(), Some("__id__"));
///     }),
/// );
///
/// stub.connect();
/// assert!(stub.connected());
/// ```
#[derive(Default)]
pub struct ClientSocketManagerStub {
    state: Mutex<StubState>,
}

impl fmt::Debug for ClientSocketManagerStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ClientSocketManagerStub")
            .field("connected", &state.connected)
            .field("disposed", &state.disposed)
            .finish_non_exhaustive()
    }
}

impl ClientSocketManagerStub {
    /// Marks this type as a stand-in.
    pub const IS_MOCK: bool = true;

    /// Creates a disconnected stub. `uri` is ignored.
    #[must_use]
    pub fn new(_uri: &str, handlers: StubEventHandlers) -> Self {
        Self {
            state: Mutex::new(StubState {
                handlers,
                ..Default::default()
            }),
        }
    }
}

// ============================================================================
// ClientSocketManagerStub - Accessors
// ============================================================================

impl ClientSocketManagerStub {
    /// Returns [`STUB_SESSION_ID`] while connected.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.connected().then(|| STUB_SESSION_ID.to_string())
    }

    /// Whether [`connect`](Self::connect) was called last.
    #[inline]
    #[must_use]
    pub fn connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Always `false`.
    #[inline]
    #[must_use]
    pub fn recovered(&self) -> bool {
        false
    }

    /// Always `false`.
    #[inline]
    #[must_use]
    pub fn auto_reconnectable(&self) -> bool {
        false
    }

    /// Whether [`dispose`](Self::dispose) was called.
    #[inline]
    #[must_use]
    pub fn disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

// ============================================================================
// ClientSocketManagerStub - Operations
// ============================================================================

impl ClientSocketManagerStub {
    /// No-op.
    pub fn emit(&self, _channel: &str, _args: Vec<Value>) {}

    /// No-op; never registers anything.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn subscribe<F>(
        &self,
        _channel: &str,
        _callback: F,
        _options: SubscribeOptions,
    ) -> Result<Option<SubscriptionId>>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Ok(None)
    }

    /// No-op.
    pub fn unsubscribe(&self, _channel: &str, _id: Option<SubscriptionId>) {}

    /// Marks the stub connected and fires `on_socket_connection`.
    pub fn connect(&self) {
        let handler = {
            let mut state = self.state.lock();
            state.connected = true;
            state.handlers.on_socket_connection.clone()
        };

        if let Some(handler) = handler {
            handler(self);
        }
    }

    /// Marks the stub disconnected and fires `on_socket_disconnection`.
    pub fn disconnect(&self) {
        let handler = {
            let mut state = self.state.lock();
            state.connected = false;
            state.handlers.on_socket_disconnection.clone()
        };

        if let Some(handler) = handler {
            handler(self, DisconnectReason::IoClientDisconnect, None);
        }
    }

    /// Disconnects and drops the handlers.
    pub fn dispose(&self) {
        self.disconnect();

        let mut state = self.state.lock();
        state.disposed = true;
        state.handlers = StubEventHandlers::default();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    fn recording_stub() -> (ClientSocketManagerStub, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let connect_sink = Arc::clone(&events);
        let disconnect_sink = Arc::clone(&events);

        let handlers = StubEventHandlers::default()
            .with_socket_connection(move |_| connect_sink.lock().push("connect".to_string()))
            .with_socket_disconnection(move |_, reason, details| {
                assert!(details.is_none());
                disconnect_sink.lock().push(reason.to_string());
            });

        (ClientSocketManagerStub::new("http://localhost", handlers), events)
    }

    #[test]
    fn test_is_mock() {
        assert!(ClientSocketManagerStub::IS_MOCK);
    }

    #[test]
    fn test_connect_and_disconnect_fire_handlers() {
        let (stub, events) = recording_stub();

        assert_eq!(stub.id(), None);
        stub.connect();
        assert_eq!(stub.id().as_deref(), Some(STUB_SESSION_ID));
        assert!(stub.connected());

        stub.disconnect();
        assert!(!stub.connected());
        assert_eq!(*events.lock(), vec!["connect", "io client disconnect"]);
    }

    #[test]
    fn test_dispose_clears_handlers() {
        let (stub, events) = recording_stub();
        stub.connect();

        stub.dispose();
        assert!(stub.disposed());
        assert!(!stub.connected());

        stub.connect();
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_everything_else_is_inert() {
        let stub = ClientSocketManagerStub::default();

        stub.emit("chat", vec![Value::Null]);
        assert_eq!(
            stub.subscribe("chat", |_| {}, SubscribeOptions::new()).unwrap(),
            None
        );
        stub.unsubscribe("chat", None);
        assert!(!stub.recovered());
        assert!(!stub.auto_reconnectable());
    }

    #[test]
    fn test_handlers_may_reenter() {
        let handlers = StubEventHandlers::default().with_socket_connection(|client| {
            assert!(client.connected());
        });
        let stub = ClientSocketManagerStub::new("", handlers);
        stub.connect();
    }
}
