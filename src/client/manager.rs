//! Client socket manager.
//!
//! Owns one transport connection and exposes a lifecycle API that stays
//! stable regardless of how the transport reconnects.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► Active ──┬── connect() / disconnect() ──► Active
//!    │               └── dispose() ──────────────────► Disposed
//!    └── connector failed ──► handle-absent (every call is a no-op)
//! ```
//!
//! # Example
//!
//! ```
//! use socket_client_manager::transport::MemoryConnector;
//! use socket_client_manager::{ClientSocketManager, ClientSocketManagerOptions};
//!
//! let connector = MemoryConnector::new();
//! let client = ClientSocketManager::with_connector(
//!     "http://localhost:3000",
//!     ClientSocketManagerOptions::new(),
//!     &connector,
//! );
//!
//! assert!(client.connected());
//! client.dispose();
//! assert!(client.disposed());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::devtool::{Devtool, DevtoolState, LogType};
use crate::identifiers::ListenerId;
use crate::transport::{Transport, TransportConnector, WebSocketConnector};

use super::bridge::{self, BridgeIds};
use super::handlers::EventHandlers;
use super::options::ClientSocketManagerOptions;
use super::registry::SubscriptionRegistry;
use super::visibility::{VisibilitySource, VisibilityState};

// ============================================================================
// Types
// ============================================================================

/// Mutable manager state. Never locked while a handler or the transport runs.
#[derive(Default)]
pub(crate) struct ManagerState {
    /// Transport handle, `None` when construction failed or after disposal.
    pub(crate) transport: Option<Arc<dyn Transport>>,
    /// Caller handlers.
    pub(crate) handlers: EventHandlers,
    /// Channel subscriptions.
    pub(crate) registry: SubscriptionRegistry,
    /// Listener ids of the attached bridges.
    pub(crate) bridges: BridgeIds,
    /// Visibility listener id.
    visibility_listener: Option<ListenerId>,
    /// Set when `dispose()` starts; guards re-entrant calls from `on_dispose`.
    disposing: bool,
    /// Set once by `dispose()`.
    pub(crate) disposed: bool,
}

/// Internal shared state for a manager.
pub(crate) struct ManagerInner {
    /// Unique identifier, also the devtool owner key.
    pub(crate) uuid: Uuid,
    /// URI the manager was created for.
    uri: String,
    /// Protected mutable state.
    pub(crate) state: Mutex<ManagerState>,
    /// Devtool driven by this manager.
    devtool: Option<Arc<Devtool>>,
    /// Page visibility source.
    visibility: Option<Arc<dyn VisibilitySource>>,
}

// ============================================================================
// ClientSocketManager
// ============================================================================

/// Connection lifecycle and channel subscription manager.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ClientSocketManager {
    pub(crate) inner: Arc<ManagerInner>,
}

/// Non-owning manager reference held by transport listeners.
#[derive(Clone)]
pub(crate) struct WeakManager(Weak<ManagerInner>);

impl WeakManager {
    /// Returns the manager if it is still alive.
    pub(crate) fn upgrade(&self) -> Option<ClientSocketManager> {
        self.0.upgrade().map(|inner| ClientSocketManager { inner })
    }
}

// ============================================================================
// ClientSocketManager - Display
// ============================================================================

impl fmt::Debug for ClientSocketManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ClientSocketManager")
            .field("uuid", &self.inner.uuid)
            .field("uri", &self.inner.uri)
            .field("attached", &state.transport.is_some())
            .field("subscriptions", &state.registry.len())
            .field("disposed", &state.disposed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientSocketManager - Constructors
// ============================================================================

impl ClientSocketManager {
    /// Creates a manager connected through the bundled WebSocket transport.
    ///
    /// Must be called from within a tokio runtime; otherwise the failure is
    /// logged and the manager stays handle-absent.
    #[must_use]
    pub fn new(uri: impl Into<String>, options: ClientSocketManagerOptions) -> Self {
        Self::with_connector(uri, options, &WebSocketConnector)
    }

    /// Creates a manager whose transport is opened by `connector`.
    ///
    /// A connector failure is logged and never propagated: the manager is
    /// returned without a transport and every operation is a no-op.
    #[must_use]
    pub fn with_connector(
        uri: impl Into<String>,
        options: ClientSocketManagerOptions,
        connector: &dyn TransportConnector,
    ) -> Self {
        let manager = Self {
            inner: Arc::new(ManagerInner {
                uuid: Uuid::new_v4(),
                uri: uri.into(),
                state: Mutex::new(ManagerState::default()),
                devtool: options.resolve_devtool(),
                visibility: options.visibility.clone(),
            }),
        };

        match connector.open(&manager.inner.uri, &options.transport) {
            Ok(transport) => manager.setup(transport, options),
            Err(e) => {
                error!(
                    uri = %manager.inner.uri,
                    path = %options.transport.path,
                    err = %e,
                    "Failed to initialize socket connection"
                );
            }
        }

        manager
    }

    fn setup(&self, transport: Arc<dyn Transport>, options: ClientSocketManagerOptions) {
        let auto_connect = options.transport.auto_connect;

        {
            let mut state = self.inner.state.lock();
            state.transport = Some(Arc::clone(&transport));
            state.handlers = options.event_handlers;
        }

        self.attach_visibility();
        bridge::attach_socket_events(self, transport.as_ref());
        bridge::attach_manager_events(self, transport.as_ref());

        if let Some(on_init) = self.handler(|h| h.on_init.clone()) {
            on_init(self);
        }

        if let Some(devtool) = &self.inner.devtool {
            devtool.init(self.inner.uuid);
        }

        debug!(uuid = %self.inner.uuid, uri = %self.inner.uri, auto_connect, "Client created");

        if auto_connect {
            transport.connect();
        }
    }
}

// ============================================================================
// ClientSocketManager - Connection
// ============================================================================

impl ClientSocketManager {
    /// Connects or reconnects the socket.
    pub fn connect(&self) {
        let Some(transport) = self.checked_transport() else {
            return;
        };

        transport.connect();
        self.render(|s| s.log(LogType::Connected, "socket was connected manually"));
    }

    /// Disconnects the socket. The transport will not reconnect on its own.
    pub fn disconnect(&self) {
        let Some(transport) = self.checked_transport() else {
            return;
        };

        transport.disconnect();
        self.render(|s| s.log(LogType::Disconnected, "socket was disconnected manually"));
    }

    /// Sends `args` on `channel`.
    pub fn emit(&self, channel: &str, args: Vec<Value>) {
        if let Some(transport) = self.checked_transport() {
            transport.emit(channel, args);
        }
    }

    /// Tears down the connection, handlers and subscriptions for good.
    pub fn dispose(&self) {
        let already = {
            let mut state = self.inner.state.lock();
            mem::replace(&mut state.disposing, true)
        };
        if already {
            self.warn_disposed();
            return;
        }

        if let Some(on_dispose) = self.handler(|h| h.on_dispose.clone()) {
            on_dispose(self);
        }

        self.detach_visibility();
        let transport = self.transport();
        if let Some(transport) = &transport {
            transport.off_socket_events();
            transport.off_manager_events();
        }

        self.disconnect();
        if let Some(transport) = &transport {
            transport.close_engine();
        }

        let registrations = {
            let mut state = self.inner.state.lock();
            state.transport = None;
            state.handlers = EventHandlers::default();
            state.bridges = BridgeIds::default();
            state.disposed = true;
            state.registry.drain()
        };
        drop(registrations);

        if let Some(devtool) = &self.inner.devtool {
            devtool.dispose(self.inner.uuid);
        }

        debug!(uuid = %self.inner.uuid, "Client disposed");
    }
}

// ============================================================================
// ClientSocketManager - Accessors
// ============================================================================

impl ClientSocketManager {
    /// Session identifier, `None` while disconnected.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.checked_transport().and_then(|t| t.id())
    }

    /// Whether the socket is connected.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.checked_transport().is_some_and(|t| t.connected())
    }

    /// Whether the last connection recovered a previous session.
    #[must_use]
    pub fn recovered(&self) -> bool {
        self.checked_transport().is_some_and(|t| t.recovered())
    }

    /// Whether the transport will reconnect on its own.
    #[must_use]
    pub fn auto_reconnectable(&self) -> bool {
        self.checked_transport().is_some_and(|t| t.active())
    }

    /// Whether [`dispose`](Self::dispose) was called.
    #[inline]
    #[must_use]
    pub fn disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Unique identifier of this manager.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    /// URI the manager was created for.
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }
}

// ============================================================================
// ClientSocketManager - Devtool
// ============================================================================

impl ClientSocketManager {
    /// Returns the devtool driven by this manager.
    #[inline]
    #[must_use]
    pub fn devtool(&self) -> Option<&Arc<Devtool>> {
        self.inner.devtool.as_ref()
    }

    /// Expands the devtool info panel.
    pub fn show_devtool(&self) {
        if let Some(devtool) = &self.inner.devtool {
            devtool.show();
        }
    }

    /// Collapses the devtool info panel.
    pub fn hide_devtool(&self) {
        if let Some(devtool) = &self.inner.devtool {
            devtool.hide();
        }
    }

    /// Applies `mutator` to the devtool if this manager owns it.
    pub(crate) fn render<F>(&self, mutator: F)
    where
        F: FnOnce(&mut DevtoolState),
    {
        if let Some(devtool) = &self.inner.devtool
            && devtool.owner() == Some(self.inner.uuid)
        {
            devtool.render(mutator);
        }
    }
}

// ============================================================================
// ClientSocketManager - Visibility
// ============================================================================

impl ClientSocketManager {
    fn attach_visibility(&self) {
        let Some(source) = &self.inner.visibility else {
            return;
        };

        let weak = self.downgrade();
        let id = source.add_listener(Arc::new(move |state| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_visibility_change(state);
            }
        }));

        let previous = self.inner.state.lock().visibility_listener.replace(id);
        if let Some(previous) = previous {
            source.remove_listener(previous);
        }
    }

    fn detach_visibility(&self) {
        let id = self.inner.state.lock().visibility_listener.take();
        if let (Some(source), Some(id)) = (&self.inner.visibility, id) {
            source.remove_listener(id);
        }
    }

    fn handle_visibility_change(&self, state: VisibilityState) {
        debug!(uuid = %self.inner.uuid, visibility = %state, "Page visibility changed");

        match state {
            VisibilityState::Visible => {
                if let Some(on_visible_page) = self.handler(|h| h.on_visible_page.clone()) {
                    on_visible_page(self);
                }
                if !self.connected() {
                    self.connect();
                }
            }
            VisibilityState::Hidden => {
                if let Some(on_hidden_page) = self.handler(|h| h.on_hidden_page.clone()) {
                    on_hidden_page(self);
                }
                self.disconnect();
            }
            VisibilityState::Prerender => {}
        }
    }
}

// ============================================================================
// ClientSocketManager - Internal
// ============================================================================

impl ClientSocketManager {
    pub(crate) fn downgrade(&self) -> WeakManager {
        WeakManager(Arc::downgrade(&self.inner))
    }

    /// Returns the transport handle without checking for disposal.
    pub(crate) fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.inner.state.lock().transport.clone()
    }

    /// Returns the transport handle, warning if the manager is disposed.
    pub(crate) fn checked_transport(&self) -> Option<Arc<dyn Transport>> {
        let transport = {
            let state = self.inner.state.lock();
            if state.disposed {
                None
            } else {
                Some(state.transport.clone())
            }
        };

        match transport {
            Some(transport) => transport,
            None => {
                self.warn_disposed();
                None
            }
        }
    }

    /// Clones a handler out of the table so it can run without the lock.
    pub(crate) fn handler<H>(&self, pick: impl FnOnce(&EventHandlers) -> Option<H>) -> Option<H> {
        pick(&self.inner.state.lock().handlers)
    }

    pub(crate) fn warn_disposed(&self) {
        warn!(
            uuid = %self.inner.uuid,
            "Attempted to use a disposed client. Please reassign the client with a new instance."
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
