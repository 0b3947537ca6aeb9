//! WebSocket transport.
//!
//! Speaks the JSON [`Packet`] protocol over `tokio-tungstenite` and owns the
//! reconnection loop.
//!
//! # Session Loop
//!
//! [`Transport::connect`] spawns one tokio task per session that:
//!
//! 1. Dials the server and waits for the `handshake` packet
//! 2. Flushes messages emitted while disconnected
//! 3. Routes `event` packets to channel listeners and answers `ping`
//! 4. On an unexpected close, retries with a doubling delay capped at
//!    `reconnection_delay_max`, at most `reconnection_attempts` times
//!
//! A server `disconnect` packet and a client `disconnect` end the session
//! without retrying.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result, TransportError};
use crate::identifiers::ListenerId;
use crate::protocol::Packet;

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

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsSink = SplitSink<WsStream, Message>;

type CommandRx = mpsc::UnboundedReceiver<SessionCommand>;

/// Commands from the public API to the session task.
enum SessionCommand {
    /// Write a packet.
    Send(Packet),
    /// Say goodbye to the server and stop.
    Disconnect,
    /// Stop without a goodbye.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Open,
    Reconnecting,
}

/// How a connected session ended.
enum SessionExit {
    /// Stopped by the client.
    Stopped,
    /// Server sent `disconnect`.
    ServerDisconnect,
    /// Connection lost.
    Lost(DisconnectReason, Option<DisconnectDetails>),
}

struct SessionState {
    phase: Phase,
    /// Bumped whenever a session starts or is stopped; stale tasks compare
    /// against it and exit.
    generation: u64,
    id: Option<String>,
    recovered: bool,
    active: bool,
    closed: bool,
    command_tx: Option<mpsc::UnboundedSender<SessionCommand>>,
    buffered: Vec<Packet>,
}

struct Shared {
    url: Url,
    options: TransportOptions,
    runtime: Handle,
    listeners: TransportListeners,
    state: Mutex<SessionState>,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// JSON packet transport over WebSocket.
///
/// Must be created inside a tokio runtime; the session task is spawned on
/// that runtime.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WebSocketTransport")
            .field("url", &self.shared.url.as_str())
            .field("phase", &state.phase)
            .field("id", &state.id)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Creates a disconnected transport for `uri`.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `uri` is not a valid URL
    /// - [`Error::Config`] if the scheme is unsupported, the options are
    ///   invalid, or no tokio runtime is running
    pub fn new(uri: &str, options: &TransportOptions) -> Result<Self> {
        options.validate()?;
        let url = build_url(uri, options)?;

        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("A tokio runtime is required: {e}")))?;

        debug!(url = %url, "WebSocket transport created");

        Ok(Self {
            shared: Arc::new(Shared {
                url,
                options: options.clone(),
                runtime,
                listeners: TransportListeners::default(),
                state: Mutex::new(SessionState {
                    phase: Phase::Idle,
                    generation: 0,
                    id: None,
                    recovered: false,
                    active: false,
                    closed: false,
                    command_tx: None,
                    buffered: Vec::new(),
                }),
            }),
        })
    }

    /// Returns the resolved endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    /// Stops the current session; returns whether the socket was open.
    fn stop(&self, command: SessionCommand, close: bool) -> bool {
        let mut state = self.shared.state.lock();
        let was_open = state.phase == Phase::Open;

        state.generation += 1;
        state.phase = Phase::Idle;
        state.active = false;
        state.id = None;
        if close {
            state.closed = true;
            state.buffered.clear();
        }

        if let Some(tx) = state.command_tx.take() {
            let _ = tx.send(command);
        }

        was_open
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.stop(SessionCommand::Close, true);
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for WebSocketTransport {
    fn connect(&self) {
        let (generation, commands) = {
            let mut state = self.shared.state.lock();
            if state.closed || state.phase != Phase::Idle {
                return;
            }

            let (tx, rx) = mpsc::unbounded_channel();
            state.generation += 1;
            state.phase = Phase::Connecting;
            state.active = true;
            state.command_tx = Some(tx);
            (state.generation, rx)
        };

        debug!(url = %self.shared.url, generation, "Connecting");

        self.shared
            .runtime
            .spawn(run_session(Arc::clone(&self.shared), generation, commands));
    }

    fn disconnect(&self) {
        let was_open = self.stop(SessionCommand::Disconnect, false);
        debug!(was_open, "Client disconnect");

        if was_open {
            self.shared
                .listeners
                .dispatch_socket(&SocketEvent::disconnect(DisconnectReason::IoClientDisconnect));
        }
    }

    fn emit(&self, channel: &str, args: Vec<Value>) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }

        let packet = Packet::event(channel, args);
        match state.command_tx.as_ref() {
            Some(tx) if state.phase == Phase::Open => {
                let _ = tx.send(SessionCommand::Send(packet));
            }
            _ => state.buffered.push(packet),
        }
    }

    fn on(&self, channel: &str, listener: MessageListener) -> ListenerId {
        self.shared.listeners.channels.on(channel.to_string(), listener)
    }

    fn off(&self, channel: &str, listener: Option<ListenerId>) {
        self.shared.listeners.channels.off(channel, listener);
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.shared.listeners.channels.listener_count(channel)
    }

    fn on_socket_event(&self, kind: SocketEventKind, listener: SocketListener) -> ListenerId {
        self.shared.listeners.socket.on(kind, listener)
    }

    fn off_socket_event(&self, kind: SocketEventKind, listener: ListenerId) {
        self.shared.listeners.socket.off(&kind, Some(listener));
    }

    fn off_socket_events(&self) {
        self.shared.listeners.socket.off_all();
        self.shared.listeners.channels.off_all();
    }

    fn on_manager_event(&self, kind: ManagerEventKind, listener: ManagerListener) -> ListenerId {
        self.shared.listeners.manager.on(kind, listener)
    }

    fn off_manager_event(&self, kind: ManagerEventKind, listener: ListenerId) {
        self.shared.listeners.manager.off(&kind, Some(listener));
    }

    fn off_manager_events(&self) {
        self.shared.listeners.manager.off_all();
    }

    fn close_engine(&self) {
        self.stop(SessionCommand::Close, true);
    }

    fn id(&self) -> Option<String> {
        self.shared.state.lock().id.clone()
    }

    fn connected(&self) -> bool {
        self.shared.state.lock().phase == Phase::Open
    }

    fn recovered(&self) -> bool {
        self.shared.state.lock().recovered
    }

    fn active(&self) -> bool {
        self.shared.state.lock().active
    }
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Default connector creating [`WebSocketTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl TransportConnector for WebSocketConnector {
    fn open(&self, uri: &str, options: &TransportOptions) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(WebSocketTransport::new(uri, options)?))
    }
}

// ============================================================================
// Shared - Session Bookkeeping
// ============================================================================

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    /// Ends the session if it is still current.
    fn finish(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }

        state.phase = Phase::Idle;
        state.active = false;
        state.id = None;
        state.command_tx = None;
        true
    }

    fn buffer(&self, packet: Packet) {
        let mut state = self.state.lock();
        if !state.closed {
            state.buffered.push(packet);
        }
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Dials, pumps and reconnects until the session is stopped or gives up.
async fn run_session(shared: Arc<Shared>, generation: u64, mut commands: CommandRx) {
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            if shared.options.attempts_exhausted(attempt) {
                if shared.finish(generation) {
                    debug!(attempts = attempt - 1, "Reconnection attempts exhausted");
                    shared
                        .listeners
                        .dispatch_manager(&ManagerEvent::ReconnectFailed);
                }
                return;
            }

            if !sleep_unless_stopped(&shared, &mut commands, shared.options.backoff(attempt)).await
                || !shared.is_current(generation)
            {
                return;
            }

            shared
                .listeners
                .dispatch_manager(&ManagerEvent::ReconnectAttempt(attempt));
        }

        let dialed = tokio::select! {
            result = dial(&shared) => result,
            () = wait_until_stopped(&shared, &mut commands) => return,
        };

        match dialed {
            Ok((ws, sid, recovered)) => {
                let buffered = {
                    let mut state = shared.state.lock();
                    if state.generation != generation {
                        return;
                    }
                    state.phase = Phase::Open;
                    state.id = Some(sid.clone());
                    state.recovered = recovered;
                    mem::take(&mut state.buffered)
                };

                debug!(%sid, recovered, attempt, "Socket connected");

                if attempt > 0 {
                    shared
                        .listeners
                        .dispatch_manager(&ManagerEvent::Reconnect(attempt));
                }
                shared.listeners.dispatch_socket(&SocketEvent::Connect);
                attempt = 0;

                match pump(&shared, ws, &mut commands, buffered).await {
                    SessionExit::Stopped => return,

                    SessionExit::ServerDisconnect => {
                        if shared.finish(generation) {
                            debug!("Socket disconnected by server");
                            shared.listeners.dispatch_socket(&SocketEvent::disconnect(
                                DisconnectReason::IoServerDisconnect,
                            ));
                        }
                        return;
                    }

                    SessionExit::Lost(reason, details) => {
                        let reconnect = {
                            let mut state = shared.state.lock();
                            if state.generation != generation {
                                return;
                            }
                            state.id = None;
                            if shared.options.reconnection && state.active {
                                state.phase = Phase::Reconnecting;
                                true
                            } else {
                                state.phase = Phase::Idle;
                                state.active = false;
                                state.command_tx = None;
                                false
                            }
                        };

                        debug!(%reason, reconnect, "Connection lost");
                        shared
                            .listeners
                            .dispatch_socket(&SocketEvent::Disconnect { reason, details });

                        if !reconnect {
                            return;
                        }
                        attempt = 1;
                    }
                }
            }

            Err(e) => {
                if !shared.is_current(generation) {
                    return;
                }

                warn!(url = %shared.url, attempt, error = %e, "Connection attempt failed");
                let error = TransportError::from(&e);

                if attempt == 0 {
                    shared
                        .listeners
                        .dispatch_manager(&ManagerEvent::Error(error.clone()));
                    shared
                        .listeners
                        .dispatch_socket(&SocketEvent::ConnectError(error));
                } else {
                    shared
                        .listeners
                        .dispatch_manager(&ManagerEvent::ReconnectError(error));
                }

                if !shared.options.reconnection {
                    shared.finish(generation);
                    return;
                }

                {
                    let mut state = shared.state.lock();
                    if state.generation != generation {
                        return;
                    }
                    state.phase = Phase::Reconnecting;
                }
                attempt += 1;
            }
        }
    }
}

/// Opens the WebSocket and waits for the handshake.
async fn dial(shared: &Shared) -> Result<(WsStream, String, bool)> {
    let limit = shared.options.connect_timeout;
    let timed_out = || Error::connection(format!("Connection timeout after {}ms", limit.as_millis()));

    let (mut ws, _response) = timeout(limit, connect_async(shared.url.as_str()))
        .await
        .map_err(|_| timed_out())??;

    let (sid, recovered) = timeout(limit, read_handshake(&mut ws))
        .await
        .map_err(|_| timed_out())??;

    Ok((ws, sid, recovered))
}

async fn read_handshake(ws: &mut WsStream) -> Result<(String, bool)> {
    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => {
                return match Packet::decode(&text)? {
                    Packet::Handshake { sid, recovered } => Ok((sid, recovered)),
                    other => Err(Error::protocol(format!(
                        "Expected handshake, received `{}`",
                        other.type_name()
                    ))),
                };
            }
            Message::Close(_) => return Err(Error::ConnectionClosed),
            _ => {}
        }
    }

    Err(Error::ConnectionClosed)
}

/// Routes packets for an open socket until it ends.
async fn pump(
    shared: &Shared,
    ws: WsStream,
    commands: &mut CommandRx,
    buffered: Vec<Packet>,
) -> SessionExit {
    let (mut ws_write, mut ws_read) = ws.split();

    for packet in &buffered {
        if let Err(e) = send_packet(&mut ws_write, packet).await {
            return lost_on_error(&e);
        }
    }
    if !buffered.is_empty() {
        trace!(count = buffered.len(), "Flushed buffered packets");
    }

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match Packet::decode(&text) {
                        Ok(Packet::Event { event, args }) => {
                            trace!(channel = %event, args = args.len(), "Message received");
                            shared.listeners.dispatch_message(&event, &args);
                        }

                        Ok(Packet::Ping) => {
                            if let Err(e) = send_packet(&mut ws_write, &Packet::Pong).await {
                                return lost_on_error(&e);
                            }
                            shared.listeners.dispatch_manager(&ManagerEvent::Ping);
                        }

                        Ok(Packet::Disconnect) => {
                            let _ = ws_write.close().await;
                            return SessionExit::ServerDisconnect;
                        }

                        Ok(other) => {
                            trace!(packet = other.type_name(), "Ignoring packet");
                        }

                        Err(e) => {
                            warn!(error = %e, "Failed to parse incoming packet");
                            let _ = ws_write.close().await;
                            return SessionExit::Lost(
                                DisconnectReason::ParseError,
                                Some(DisconnectDetails::new("malformed packet").with_context(e.to_string())),
                            );
                        }
                    },

                    Some(Ok(Message::Close(frame))) => {
                        debug!("WebSocket closed by remote");
                        let details = frame.map(|frame| {
                            DisconnectDetails::new("connection closed by server")
                                .with_context(frame.reason.to_string())
                        });
                        return SessionExit::Lost(DisconnectReason::TransportClose, details);
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        return SessionExit::Lost(
                            DisconnectReason::TransportError,
                            Some(DisconnectDetails::new("websocket error").with_context(e.to_string())),
                        );
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        return SessionExit::Lost(DisconnectReason::TransportClose, None);
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Send(packet)) => {
                        if let Err(e) = send_packet(&mut ws_write, &packet).await {
                            warn!(error = %e, "Failed to send packet");
                            shared.buffer(packet);
                            return lost_on_error(&e);
                        }
                    }

                    Some(SessionCommand::Disconnect) => {
                        let _ = send_packet(&mut ws_write, &Packet::Disconnect).await;
                        let _ = ws_write.close().await;
                        return SessionExit::Stopped;
                    }

                    Some(SessionCommand::Close) | None => {
                        let _ = ws_write.close().await;
                        return SessionExit::Stopped;
                    }
                }
            }
        }
    }
}

async fn send_packet(sink: &mut WsSink, packet: &Packet) -> Result<()> {
    let text = packet.encode()?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

fn lost_on_error(error: &Error) -> SessionExit {
    SessionExit::Lost(
        DisconnectReason::TransportError,
        Some(DisconnectDetails::new("write failed").with_context(error.to_string())),
    )
}

/// Sleeps for `delay`; returns `false` if the session was stopped meanwhile.
async fn sleep_unless_stopped(shared: &Shared, commands: &mut CommandRx, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(SessionCommand::Send(packet)) => shared.buffer(packet),
                _ => return false,
            },
        }
    }
}

/// Resolves once the session is stopped, buffering sends meanwhile.
async fn wait_until_stopped(shared: &Shared, commands: &mut CommandRx) {
    loop {
        match commands.recv().await {
            Some(SessionCommand::Send(packet)) => shared.buffer(packet),
            _ => return,
        }
    }
}

// ============================================================================
// URL Mapping
// ============================================================================

/// Maps a user URI to the WebSocket endpoint.
///
/// `http` becomes `ws`, `https` becomes `wss`, the path is replaced by
/// `options.path` and query parameters are appended.
fn build_url(uri: &str, options: &TransportOptions) -> Result<Url> {
    let mut url = Url::parse(uri)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::config(format!("Unsupported URI scheme `{other}`"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::config(format!("Cannot switch {uri} to `{scheme}`")))?;

    url.set_path(&options.path);

    if !options.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &options.query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    #[test]
    fn test_build_url_maps_scheme_and_path() {
        let url = assert_ok!(build_url(
            "http://localhost:3000",
            &TransportOptions::default()
        ));
        assert_eq!(url.as_str(), "ws://localhost:3000/socket.io");

        let url = assert_ok!(build_url(
            "https://example.com/ignored?keep=1",
            &TransportOptions::new().with_path("/rt"),
        ));
        assert_eq!(url.as_str(), "wss://example.com/rt?keep=1");
    }

    #[test]
    fn test_build_url_appends_query() {
        let options = TransportOptions::new()
            .with_query("token", "a b")
            .with_query("room", "lobby");
        let url = assert_ok!(build_url("ws://127.0.0.1:9000", &options));

        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:9000/socket.io?room=lobby&token=a+b"
        );
    }

    #[test]
    fn test_build_url_rejects_bad_input() {
        assert!(matches!(
            build_url("not a uri", &TransportOptions::default()),
            Err(Error::Url(_))
        ));
        assert!(matches!(
            build_url("ftp://example.com", &TransportOptions::default()),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = WebSocketTransport::new("http://localhost:3000", &TransportOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_new_inside_runtime() {
        let transport = assert_ok!(WebSocketTransport::new(
            "http://localhost:3000",
            &TransportOptions::default()
        ));

        assert!(!transport.connected());
        assert!(!transport.active());
        assert!(transport.id().is_none());
        assert_eq!(transport.url().scheme(), "ws");
    }

    #[tokio::test]
    async fn test_refused_connection_reports_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let options = TransportOptions::new().with_reconnection(false);
        let transport =
            WebSocketTransport::new(&format!("http://127.0.0.1:{port}"), &options).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager_tx = tx.clone();
        transport.on_manager_event(
            ManagerEventKind::Error,
            Arc::new(move |event| {
                let _ = manager_tx.send(format!("{event:?}"));
            }),
        );
        transport.on_socket_event(
            SocketEventKind::ConnectError,
            Arc::new(move |event| {
                let _ = tx.send(format!("{event:?}"));
            }),
        );

        transport.connect();
        assert!(transport.active());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.starts_with("Error("));
        assert!(second.starts_with("ConnectError("));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!transport.active());
        assert!(!transport.connected());
    }

    #[tokio::test]
    async fn test_emit_buffers_while_disconnected() {
        let transport =
            WebSocketTransport::new("http://localhost:3000", &TransportOptions::default()).unwrap();

        transport.emit("chat", vec![Value::from("hi")]);
        assert_eq!(transport.shared.state.lock().buffered.len(), 1);

        transport.close_engine();
        assert!(transport.shared.state.lock().buffered.is_empty());
        transport.connect();
        assert!(!transport.active());
    }
}
