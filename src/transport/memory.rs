//! In-process loopback transport.
//!
//! [`MemoryTransport`] behaves like a connected socket whose server side is
//! driven programmatically. Every event is dispatched synchronously on the
//! calling thread, which makes manager behavior fully deterministic in tests.
//!
//! | Client side ([`Transport`]) | Server side (simulation) |
//! |-----------------------------|--------------------------|
//! | `connect`, `disconnect` | [`server_emit`](MemoryTransport::server_emit) |
//! | `emit` (recorded in [`sent`](MemoryTransport::sent)) | [`server_disconnect`](MemoryTransport::server_disconnect) |
//! | `on`, `off` | [`drop_connection`](MemoryTransport::drop_connection) |
//! | `close_engine` | [`fail_connection`](MemoryTransport::fail_connection), [`reconnect`](MemoryTransport::reconnect), [`ping`](MemoryTransport::ping) |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{Error, Result, TransportError};
use crate::identifiers::ListenerId;

use super::emitter::{ManagerListener, MessageListener, SocketListener, TransportListeners};
use super::event::{
    DisconnectDetails, DisconnectReason, ManagerEvent, ManagerEventKind, SocketEvent,
    SocketEventKind,
};
use super::options::TransportOptions;
use super::{Transport, TransportConnector};

// ============================================================================
// Types
// ============================================================================

/// A message the client emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    /// Channel name.
    pub channel: String,
    /// Payload arguments.
    pub args: Vec<Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    active: bool,
    closed: bool,
    recovered: bool,
    id: Option<String>,
    refusal: Option<TransportError>,
    sent: Vec<SentMessage>,
    buffered: Vec<SentMessage>,
    connect_calls: usize,
    disconnect_calls: usize,
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Loopback transport with a programmable server side.
#[derive(Debug)]
pub struct MemoryTransport {
    listeners: TransportListeners,
    state: Mutex<MemoryState>,
    reconnection: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(&TransportOptions::default())
    }
}

impl MemoryTransport {
    /// Creates a disconnected transport.
    #[must_use]
    pub fn new(options: &TransportOptions) -> Self {
        Self {
            listeners: TransportListeners::default(),
            state: Mutex::new(MemoryState::default()),
            reconnection: options.reconnection,
        }
    }

    /// Marks the socket open and returns the new session id.
    fn open_session(state: &mut MemoryState) -> String {
        let id = Uuid::new_v4().to_string();
        state.connected = true;
        state.active = true;
        state.id = Some(id.clone());

        let buffered = std::mem::take(&mut state.buffered);
        state.sent.extend(buffered);
        id
    }
}

// ============================================================================
// MemoryTransport - Server Simulation
// ============================================================================

impl MemoryTransport {
    /// Delivers a server message on `channel`.
    ///
    /// Returns how many listeners received it; `0` while disconnected.
    pub fn server_emit(&self, channel: &str, args: Vec<Value>) -> usize {
        if !self.state.lock().connected {
            return 0;
        }

        trace!(channel, args = args.len(), "Server message");
        self.listeners.dispatch_message(channel, &args)
    }

    /// Forcibly disconnects the socket from the server side.
    ///
    /// The transport does not reconnect afterwards.
    pub fn server_disconnect(&self) {
        {
            let mut state = self.state.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.active = false;
            state.id = None;
        }

        debug!("Server closed the socket");
        self.listeners
            .dispatch_socket(&SocketEvent::disconnect(DisconnectReason::IoServerDisconnect));
    }

    /// Simulates a lost connection with `reason`.
    ///
    /// The transport stays active if reconnection is enabled.
    pub fn drop_connection(&self, reason: DisconnectReason) {
        {
            let mut state = self.state.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.active = state.active && self.reconnection;
            state.id = None;
        }

        self.listeners.dispatch_socket(&SocketEvent::Disconnect {
            reason,
            details: Some(DisconnectDetails::new("connection lost")),
        });
    }

    /// Makes subsequent `connect` calls fail with `error`, or succeed again
    /// when `None`.
    pub fn refuse_connections(&self, error: Option<TransportError>) {
        self.state.lock().refusal = error;
    }

    /// Reports a failed connection attempt.
    pub fn fail_connection(&self, error: TransportError) {
        self.listeners
            .dispatch_manager(&ManagerEvent::Error(error.clone()));
        self.listeners
            .dispatch_socket(&SocketEvent::ConnectError(error));
    }

    /// Runs a reconnection sequence that succeeds after `attempts` attempts.
    ///
    /// Dispatches `ReconnectAttempt(1..=attempts)`, `Reconnect(attempts)`
    /// then `Connect`.
    pub fn reconnect(&self, attempts: u32) {
        for attempt in 1..=attempts {
            self.listeners
                .dispatch_manager(&ManagerEvent::ReconnectAttempt(attempt));
        }

        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            Self::open_session(&mut state);
            state.recovered = true;
        }

        self.listeners
            .dispatch_manager(&ManagerEvent::Reconnect(attempts));
        self.listeners.dispatch_socket(&SocketEvent::Connect);
    }

    /// Runs a reconnection sequence that gives up after `attempts` attempts.
    pub fn exhaust_reconnection(&self, attempts: u32, error: &TransportError) {
        for attempt in 1..=attempts {
            self.listeners
                .dispatch_manager(&ManagerEvent::ReconnectAttempt(attempt));
            self.listeners
                .dispatch_manager(&ManagerEvent::ReconnectError(error.clone()));
        }

        self.state.lock().active = false;
        self.listeners.dispatch_manager(&ManagerEvent::ReconnectFailed);
    }

    /// Sends a server ping.
    pub fn ping(&self) {
        self.listeners.dispatch_manager(&ManagerEvent::Ping);
    }

    /// Dispatches an arbitrary reconnection-manager event.
    pub fn dispatch_manager_event(&self, event: &ManagerEvent) -> usize {
        self.listeners.dispatch_manager(event)
    }

    /// Returns the messages the client emitted while connected.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Returns how many times `connect` was called.
    #[inline]
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    /// Returns how many times `disconnect` was called.
    #[inline]
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    /// Returns `true` once the engine was closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns how many socket lifecycle listeners are attached.
    #[inline]
    #[must_use]
    pub fn socket_listener_count(&self) -> usize {
        self.listeners.socket.len()
    }

    /// Returns how many reconnection-manager listeners are attached.
    #[inline]
    #[must_use]
    pub fn manager_listener_count(&self) -> usize {
        self.listeners.manager.len()
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for MemoryTransport {
    fn connect(&self) {
        let refusal = {
            let mut state = self.state.lock();
            state.connect_calls += 1;

            if state.closed || state.connected {
                return;
            }

            match state.refusal.clone() {
                Some(error) => {
                    state.active = true;
                    Some(error)
                }
                None => {
                    let id = Self::open_session(&mut state);
                    debug!(%id, "Memory socket connected");
                    None
                }
            }
        };

        match refusal {
            Some(error) => self.fail_connection(error),
            None => {
                self.listeners.dispatch_socket(&SocketEvent::Connect);
            }
        }
    }

    fn disconnect(&self) {
        let was_connected = {
            let mut state = self.state.lock();
            state.disconnect_calls += 1;
            state.active = false;
            state.id = None;
            std::mem::replace(&mut state.connected, false)
        };

        if was_connected {
            self.listeners
                .dispatch_socket(&SocketEvent::disconnect(DisconnectReason::IoClientDisconnect));
        }
    }

    fn emit(&self, channel: &str, args: Vec<Value>) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        let message = SentMessage {
            channel: channel.to_string(),
            args,
        };

        if state.connected {
            state.sent.push(message);
        } else {
            state.buffered.push(message);
        }
    }

    fn on(&self, channel: &str, listener: MessageListener) -> ListenerId {
        self.listeners.channels.on(channel.to_string(), listener)
    }

    fn off(&self, channel: &str, listener: Option<ListenerId>) {
        self.listeners.channels.off(channel, listener);
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.listeners.channels.listener_count(channel)
    }

    fn on_socket_event(&self, kind: SocketEventKind, listener: SocketListener) -> ListenerId {
        self.listeners.socket.on(kind, listener)
    }

    fn off_socket_event(&self, kind: SocketEventKind, listener: ListenerId) {
        self.listeners.socket.off(&kind, Some(listener));
    }

    fn off_socket_events(&self) {
        self.listeners.socket.off_all();
        self.listeners.channels.off_all();
    }

    fn on_manager_event(&self, kind: ManagerEventKind, listener: ManagerListener) -> ListenerId {
        self.listeners.manager.on(kind, listener)
    }

    fn off_manager_event(&self, kind: ManagerEventKind, listener: ListenerId) {
        self.listeners.manager.off(&kind, Some(listener));
    }

    fn off_manager_events(&self) {
        self.listeners.manager.off_all();
    }

    fn close_engine(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.connected = false;
        state.active = false;
        state.id = None;
        state.buffered.clear();
    }

    fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    fn connected(&self) -> bool {
        self.state.lock().connected
    }

    fn recovered(&self) -> bool {
        self.state.lock().recovered
    }

    fn active(&self) -> bool {
        self.state.lock().active
    }
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector that hands out [`MemoryTransport`]s and keeps them for inspection.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    opened: Mutex<Vec<Arc<MemoryTransport>>>,
    failure: Option<String>,
}

impl MemoryConnector {
    /// Creates a connector.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector whose `open` always fails with `message`.
    #[inline]
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    /// Returns every transport opened so far.
    #[must_use]
    pub fn transports(&self) -> Vec<Arc<MemoryTransport>> {
        self.opened.lock().clone()
    }

    /// Returns the most recently opened transport.
    #[must_use]
    pub fn last(&self) -> Option<Arc<MemoryTransport>> {
        self.opened.lock().last().cloned()
    }
}

impl TransportConnector for MemoryConnector {
    fn open(&self, _uri: &str, options: &TransportOptions) -> Result<Arc<dyn Transport>> {
        if let Some(message) = &self.failure {
            return Err(Error::connection(message.clone()));
        }

        options.validate()?;

        let transport = Arc::new(MemoryTransport::new(options));
        self.opened.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

// ============================================================================
// Tests
// ============================================================================
