//! Socket Client Manager - connection lifecycle and channel subscriptions
//! for real-time socket transports.
//!
//! The manager owns a single transport connection and exposes a lifecycle
//! API (`connect` / `disconnect` / `dispose`) that stays stable regardless of
//! how the transport reconnects underneath.
//!
//! # Architecture
//!
//! ```text
//!  caller ──► ClientSocketManager ──► Transport (WebSocket / Memory)
//!                 │      ▲                   │
//!                 │      └── Event Bridge ◄──┘ socket + reconnection events
//!                 │
//!                 ├── subscription registry (channels, abort signals)
//!                 └── Devtool (status, channels, capped log history)
//! ```
//!
//! Key design principles:
//!
//! - Every handler receives the client as its first argument
//! - Locks are never held while a handler or the transport runs
//! - Transport listeners hold weak manager references
//! - Reconnection backoff lives in the transport, never in the manager
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use socket_client_manager::{
//!     ClientSocketManager, ClientSocketManagerOptions, EventHandlers, Result, SubscribeOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let handlers = EventHandlers::new()
//!         .with_socket_connection(|client| println!("connected as {:?}", client.id()));
//!
//!     let client = ClientSocketManager::new(
//!         "http://localhost:3000",
//!         ClientSocketManagerOptions::new().with_event_handlers(handlers),
//!     );
//!
//!     client.subscribe("server/message", |args| println!("{args:?}"), SubscribeOptions::new())?;
//!     client.emit("client/message", vec![json!("Hello from the client!")]);
//!
//!     client.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`ClientSocketManager`], handlers, options, stub |
//! | [`devtool`] | Observable state projector |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Listener and subscription ids |
//! | [`protocol`] | JSON packets of the WebSocket transport |
//! | [`signal`] | Abort controller and signal |
//! | [`transport`] | Transport trait and bundled transports |

// ============================================================================
// Modules
// ============================================================================

/// Connection lifecycle manager and its collaborators.
pub mod client;

/// Observable state projector.
pub mod devtool;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Listener and subscription identifiers.
pub mod identifiers;

/// WebSocket transport packets.
pub mod protocol;

/// Synchronous cancellation tokens.
pub mod signal;

/// Transport abstraction.
///
/// The manager talks to a connection only through [`transport::Transport`].
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ClientSocketManager, ClientSocketManagerOptions, ClientSocketManagerStub, DevtoolOptions,
    EventHandlers, ManualVisibility, StubEventHandlers, SubscribeOptions, VisibilitySource,
    VisibilityState,
};

// Devtool types
pub use devtool::{Devtool, DevtoolState, FixedQueue, LogType, Status};

// Error types
pub use error::{Error, Result, TransportError};

// Identifier types
pub use identifiers::{ListenerId, SubscriptionId};

// Signal types
pub use signal::{AbortController, AbortRegistration, AbortSignal};

// Transport types
pub use transport::{
    DisconnectDetails, DisconnectReason, Transport, TransportConnector, TransportOptions,
};
