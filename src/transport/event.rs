//! Transport lifecycle events.
//!
//! Events come from two sources, mirroring the layout of socket.io style
//! transports:
//!
//! | Source | Type | Events |
//! |--------|------|--------|
//! | Socket | [`SocketEvent`] | `connect`, `connect_error`, `disconnect` |
//! | Reconnection manager | [`ManagerEvent`] | `ping`, `error`, `reconnect_attempt`, `reconnect_error`, `reconnect_failed`, `reconnect` |
//!
//! Each event has a payload-free `*Kind` used as the subscription key.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::TransportError;

// ============================================================================
// Constants
// ============================================================================

/// Event names that can never be used as channel names.
pub const RESERVED_EVENTS: [&str; 6] = [
    "connect",
    "connect_error",
    "disconnect",
    "disconnecting",
    "newListener",
    "removeListener",
];

/// Returns `true` if `name` is a reserved lifecycle event name.
#[inline]
#[must_use]
pub fn is_reserved_event(name: &str) -> bool {
    RESERVED_EVENTS.contains(&name)
}

// ============================================================================
// DisconnectReason
// ============================================================================

/// Why a socket disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server forcibly closed the socket.
    IoServerDisconnect,
    /// The client called `disconnect`.
    IoClientDisconnect,
    /// The server stopped answering pings.
    PingTimeout,
    /// The underlying connection was closed.
    TransportClose,
    /// The underlying connection failed.
    TransportError,
    /// The peer sent an undecodable packet.
    ParseError,
}

impl DisconnectReason {
    /// Returns the canonical reason string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IoServerDisconnect => "io server disconnect",
            Self::IoClientDisconnect => "io client disconnect",
            Self::PingTimeout => "ping timeout",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
            Self::ParseError => "parse error",
        }
    }

    /// Returns `true` if the transport itself is expected to reconnect.
    ///
    /// Explicit disconnects (from either side) are final.
    #[inline]
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::IoServerDisconnect | Self::IoClientDisconnect)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra information attached to a disconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectDetails {
    /// Human readable description.
    pub description: String,
    /// Optional low-level context (close code, error text).
    pub context: Option<String>,
}

impl DisconnectDetails {
    /// Creates details without context.
    #[inline]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: None,
        }
    }

    /// Attaches low-level context.
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

// ============================================================================
// SocketEvent
// ============================================================================

/// Subscription key for [`SocketEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketEventKind {
    /// Connection (or reconnection) established.
    Connect,
    /// Connection attempt failed.
    ConnectError,
    /// Socket disconnected.
    Disconnect,
}

impl SocketEventKind {
    /// Returns the reserved event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::ConnectError => "connect_error",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Event emitted by the socket itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Connection (or reconnection) established.
    Connect,
    /// Connection attempt failed.
    ConnectError(TransportError),
    /// Socket disconnected.
    Disconnect {
        /// Why the socket disconnected.
        reason: DisconnectReason,
        /// Optional extra information.
        details: Option<DisconnectDetails>,
    },
}

impl SocketEvent {
    /// Creates a disconnect event without details.
    #[inline]
    #[must_use]
    pub fn disconnect(reason: DisconnectReason) -> Self {
        Self::Disconnect {
            reason,
            details: None,
        }
    }

    /// Returns the subscription key.
    #[must_use]
    pub const fn kind(&self) -> SocketEventKind {
        match self {
            Self::Connect => SocketEventKind::Connect,
            Self::ConnectError(_) => SocketEventKind::ConnectError,
            Self::Disconnect { .. } => SocketEventKind::Disconnect,
        }
    }
}

// ============================================================================
// ManagerEvent
// ============================================================================

/// Subscription key for [`ManagerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerEventKind {
    /// Ping received from the server.
    Ping,
    /// Connection error.
    Error,
    /// Reconnection attempt started.
    ReconnectAttempt,
    /// Reconnection attempt failed.
    ReconnectError,
    /// Reconnection attempts exhausted.
    ReconnectFailed,
    /// Reconnected.
    Reconnect,
}

impl ManagerEventKind {
    /// Returns the reserved event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Error => "error",
            Self::ReconnectAttempt => "reconnect_attempt",
            Self::ReconnectError => "reconnect_error",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Reconnect => "reconnect",
        }
    }
}

/// Event emitted by the transport's reconnection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Ping received from the server.
    Ping,
    /// Connection error.
    Error(TransportError),
    /// Reconnection attempt `n` started.
    ReconnectAttempt(u32),
    /// Reconnection attempt failed.
    ReconnectError(TransportError),
    /// Reconnection attempts exhausted.
    ReconnectFailed,
    /// Reconnected after `n` attempts.
    Reconnect(u32),
}

impl ManagerEvent {
    /// Returns the subscription key.
    #[must_use]
    pub const fn kind(&self) -> ManagerEventKind {
        match self {
            Self::Ping => ManagerEventKind::Ping,
            Self::Error(_) => ManagerEventKind::Error,
            Self::ReconnectAttempt(_) => ManagerEventKind::ReconnectAttempt,
            Self::ReconnectError(_) => ManagerEventKind::ReconnectError,
            Self::ReconnectFailed => ManagerEventKind::ReconnectFailed,
            Self::Reconnect(_) => ManagerEventKind::Reconnect,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
