//! Event bridge between a transport and the manager.
//!
//! Translates socket lifecycle events and reconnection-manager events into
//! handler calls and devtool updates.
//!
//! | Event | Handler | Devtool |
//! |-------|---------|---------|
//! | `Connect` | `on_socket_connection` | status `Connected` |
//! | `ConnectError` | `on_socket_connection_error` | |
//! | `Disconnect` | `on_socket_disconnection` | status `Disconnected` |
//! | `Error` | `on_connection_error` | log `ConnectionError` |
//! | `Ping` | `on_server_ping` | |
//! | `ReconnectAttempt` | `on_reconnecting` | status `Reconnecting`, log |
//! | `ReconnectError` | `on_reconnecting_error` | log `ReconnectingError` |
//! | `ReconnectFailed` | `on_reconnection_failure` | log `ReconnectionFailure` |
//! | `Reconnect` | `on_successful_reconnection` | log `SuccessfulReconnection` |
//!
//! Listeners hold a weak manager reference and do nothing once the manager
//! is gone or has lost its transport handle.

// ============================================================================
// Imports
// ============================================================================

use std::mem;
use std::sync::Arc;

use tracing::debug;

use crate::devtool::{LogType, Status};
use crate::identifiers::ListenerId;
use crate::transport::emitter::Listener;
use crate::transport::{
    DisconnectReason, ManagerEvent, ManagerEventKind, SocketEvent, SocketEventKind, Transport,
};

use super::manager::ClientSocketManager;

// ============================================================================
// Types
// ============================================================================

/// Listener ids of the attached bridges, used to detach them on re-attachment.
#[derive(Debug, Default)]
pub(crate) struct BridgeIds {
    socket: Vec<(SocketEventKind, ListenerId)>,
    manager: Vec<(ManagerEventKind, ListenerId)>,
}

// ============================================================================
// Listener Construction
// ============================================================================

/// Wraps `f` into a transport listener bound to a weak manager reference.
fn bridged<E, F>(manager: &ClientSocketManager, f: F) -> Listener<E>
where
    E: 'static,
    F: Fn(&ClientSocketManager, &E) + Send + Sync + 'static,
{
    let weak = manager.downgrade();
    Arc::new(move |event: &E| {
        let Some(manager) = weak.upgrade() else {
            return;
        };
        if manager.transport().is_none() {
            return;
        }
        f(&manager, event);
    })
}

// ============================================================================
// Socket Events
// ============================================================================

/// Attaches the socket lifecycle bridge, replacing a previous one.
pub(crate) fn attach_socket_events(manager: &ClientSocketManager, transport: &dyn Transport) {
    let previous = mem::take(&mut manager.inner.state.lock().bridges.socket);
    for (kind, id) in previous {
        transport.off_socket_event(kind, id);
    }

    let mut ids = Vec::with_capacity(3);

    let on_connect = bridged(manager, |manager, _: &SocketEvent| {
        debug!(uuid = %manager.uuid(), "Socket connected");

        if let Some(handler) = manager.handler(|h| h.on_socket_connection.clone()) {
            handler(manager);
        }
        manager.render(|s| s.status = Status::Connected);
    });
    ids.push((
        SocketEventKind::Connect,
        transport.on_socket_event(SocketEventKind::Connect, on_connect),
    ));

    if manager
        .handler(|h| h.on_socket_connection_error.clone())
        .is_some()
    {
        let on_connect_error = bridged(manager, |manager, event: &SocketEvent| {
            let SocketEvent::ConnectError(err) = event else {
                return;
            };
            if let Some(handler) = manager.handler(|h| h.on_socket_connection_error.clone()) {
                handler(manager, err);
            }
        });
        ids.push((
            SocketEventKind::ConnectError,
            transport.on_socket_event(SocketEventKind::ConnectError, on_connect_error),
        ));
    }

    let on_disconnect = bridged(manager, |manager, event: &SocketEvent| {
        let SocketEvent::Disconnect { reason, details } = event else {
            return;
        };
        debug!(uuid = %manager.uuid(), %reason, "Socket disconnected");

        if let Some(handler) = manager.handler(|h| h.on_socket_disconnection.clone()) {
            handler(manager, *reason, details.as_ref());
        }
        manager.render(|s| s.status = Status::Disconnected);

        if !manager.auto_reconnectable() && *reason == DisconnectReason::IoServerDisconnect {
            manager.connect();
        }
    });
    ids.push((
        SocketEventKind::Disconnect,
        transport.on_socket_event(SocketEventKind::Disconnect, on_disconnect),
    ));

    manager.inner.state.lock().bridges.socket = ids;
}

// ============================================================================
// Manager Events
// ============================================================================

/// Attaches the reconnection-manager bridge, replacing a previous one.
pub(crate) fn attach_manager_events(manager: &ClientSocketManager, transport: &dyn Transport) {
    let previous = mem::take(&mut manager.inner.state.lock().bridges.manager);
    for (kind, id) in previous {
        transport.off_manager_event(kind, id);
    }

    let mut ids = Vec::with_capacity(6);
    let mut attach = |kind: ManagerEventKind, listener: Listener<ManagerEvent>| {
        ids.push((kind, transport.on_manager_event(kind, listener)));
    };

    attach(
        ManagerEventKind::Error,
        bridged(manager, |manager, event: &ManagerEvent| {
            let ManagerEvent::Error(err) = event else {
                return;
            };
            if let Some(handler) = manager.handler(|h| h.on_connection_error.clone()) {
                handler(manager, err);
            }
            manager.render(|s| s.log(LogType::ConnectionError, err.message.as_str()));
        }),
    );

    if manager.handler(|h| h.on_server_ping.clone()).is_some() {
        attach(
            ManagerEventKind::Ping,
            bridged(manager, |manager, _: &ManagerEvent| {
                if let Some(handler) = manager.handler(|h| h.on_server_ping.clone()) {
                    handler(manager);
                }
            }),
        );
    }

    attach(
        ManagerEventKind::ReconnectAttempt,
        bridged(manager, |manager, event: &ManagerEvent| {
            let ManagerEvent::ReconnectAttempt(attempt) = *event else {
                return;
            };
            debug!(uuid = %manager.uuid(), attempt, "Reconnecting");

            if let Some(handler) = manager.handler(|h| h.on_reconnecting.clone()) {
                handler(manager, attempt);
            }
            manager.render(|s| {
                s.status = Status::Reconnecting;
                s.log(
                    LogType::Reconnecting,
                    format!("Reconnecting... ({attempt} attempt(s))"),
                );
            });
        }),
    );

    attach(
        ManagerEventKind::ReconnectError,
        bridged(manager, |manager, event: &ManagerEvent| {
            let ManagerEvent::ReconnectError(err) = event else {
                return;
            };
            if let Some(handler) = manager.handler(|h| h.on_reconnecting_error.clone()) {
                handler(manager, err);
            }
            manager.render(|s| s.log(LogType::ReconnectingError, err.message.as_str()));
        }),
    );

    attach(
        ManagerEventKind::ReconnectFailed,
        bridged(manager, |manager, _: &ManagerEvent| {
            debug!(uuid = %manager.uuid(), "Reconnection failed");

            if let Some(handler) = manager.handler(|h| h.on_reconnection_failure.clone()) {
                handler(manager);
            }
            manager.render(|s| s.log(LogType::ReconnectionFailure, "Failed to reconnect."));
        }),
    );

    attach(
        ManagerEventKind::Reconnect,
        bridged(manager, |manager, event: &ManagerEvent| {
            let ManagerEvent::Reconnect(attempt) = *event else {
                return;
            };
            debug!(uuid = %manager.uuid(), attempt, "Reconnected");

            if let Some(handler) = manager.handler(|h| h.on_successful_reconnection.clone()) {
                handler(manager, attempt);
            }
            manager.render(|s| {
                s.log(
                    LogType::SuccessfulReconnection,
                    format!("Successfully connected after {attempt} attempt(s)"),
                );
            });
        }),
    );

    manager.inner.state.lock().bridges.manager = ids;
}

// ============================================================================
// Tests
// ============================================================================
