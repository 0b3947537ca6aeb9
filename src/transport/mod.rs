//! Transport abstraction and bundled transports.
//!
//! The manager drives a connection exclusively through the [`Transport`]
//! trait and obtains one through a [`TransportConnector`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   Transport    ┌─────────────────────┐
//! │  ClientSocketManager │───────────────►│  WebSocketTransport │◄──► server
//! │                      │                │  MemoryTransport    │
//! │  bridges / registry  │◄───────────────│                     │
//! └──────────────────────┘  SocketEvent   └─────────────────────┘
//!                           ManagerEvent
//!                           channel payloads
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `emitter` | Keyed listener tables shared by the transports |
//! | `event` | Socket and reconnection-manager events |
//! | `memory` | In-process loopback transport |
//! | `options` | Connection options |
//! | `websocket` | JSON packet transport over WebSocket |

// ============================================================================
// Submodules
// ============================================================================

/// Keyed listener tables.
pub mod emitter;

/// Lifecycle events.
pub mod event;

/// In-process loopback transport.
pub mod memory;

/// Connection options.
pub mod options;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::identifiers::ListenerId;

// ============================================================================
// Re-exports
// ============================================================================

pub use emitter::{EventEmitter, ManagerListener, MessageListener, SocketListener, TransportListeners};
pub use event::{
    DisconnectDetails, DisconnectReason, ManagerEvent, ManagerEventKind, RESERVED_EVENTS,
    SocketEvent, SocketEventKind, is_reserved_event,
};
pub use memory::{MemoryConnector, MemoryTransport};
pub use options::TransportOptions;
pub use websocket::{WebSocketConnector, WebSocketTransport};

// ============================================================================
// Transport
// ============================================================================

/// A real-time connection with named channels and lifecycle events.
///
/// Implementations deliver events from their own context and must never hold
/// an internal lock while calling a listener.
pub trait Transport: Send + Sync {
    /// Opens (or reopens) the connection. No-op if already open or opening.
    fn connect(&self);

    /// Closes the connection on the client's request.
    ///
    /// Dispatches `Disconnect(IoClientDisconnect)` if the socket was connected
    /// and disables reconnection until the next [`connect`](Self::connect).
    fn disconnect(&self);

    /// Sends `args` on `channel`. Buffered while disconnected.
    fn emit(&self, channel: &str, args: Vec<Value>);

    /// Attaches a payload listener on `channel`.
    fn on(&self, channel: &str, listener: MessageListener) -> ListenerId;

    /// Detaches one listener on `channel`, or all of them when `listener` is `None`.
    fn off(&self, channel: &str, listener: Option<ListenerId>);

    /// Returns how many payload listeners are attached on `channel`.
    fn listener_count(&self, channel: &str) -> usize;

    /// Attaches a socket lifecycle listener.
    fn on_socket_event(&self, kind: SocketEventKind, listener: SocketListener) -> ListenerId;

    /// Detaches one socket lifecycle listener.
    fn off_socket_event(&self, kind: SocketEventKind, listener: ListenerId);

    /// Detaches every socket lifecycle and channel listener.
    fn off_socket_events(&self);

    /// Attaches a reconnection-manager listener.
    fn on_manager_event(&self, kind: ManagerEventKind, listener: ManagerListener) -> ListenerId;

    /// Detaches one reconnection-manager listener.
    fn off_manager_event(&self, kind: ManagerEventKind, listener: ListenerId);

    /// Detaches every reconnection-manager listener.
    fn off_manager_events(&self);

    /// Tears down the underlying connection for good.
    fn close_engine(&self);

    /// Session identifier, `None` while disconnected.
    fn id(&self) -> Option<String>;

    /// Whether the socket is connected.
    fn connected(&self) -> bool;

    /// Whether the last connection recovered a previous session.
    fn recovered(&self) -> bool;

    /// Whether the transport will try to reconnect on its own.
    fn active(&self) -> bool;
}

// ============================================================================
// TransportConnector
// ============================================================================

/// Opens transports for a manager.
pub trait TransportConnector: Send + Sync {
    /// Creates a transport for `uri` without connecting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be created (invalid URI,
    /// invalid options, missing runtime).
    fn open(&self, uri: &str, options: &TransportOptions) -> Result<Arc<dyn Transport>>;
}
