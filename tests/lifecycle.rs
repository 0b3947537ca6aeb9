//! End-to-end lifecycle against a local WebSocket server.
//!
//! The server side speaks the JSON packet protocol directly through
//! `tokio-tungstenite`, so every scenario exercises the real session loop.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing_subscriber::EnvFilter;

use socket_client_manager::protocol::Packet;
use socket_client_manager::{
    ClientSocketManager, ClientSocketManagerOptions, DevtoolOptions, DisconnectReason,
    EventHandlers, LogType, Status, SubscribeOptions,
};

// ============================================================================
// Test Server
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

/// Accepts clients and hands each one over after the handshake.
struct TestServer {
    addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<(String, ServerSocket)>,
}

/// Installs a subscriber once; `RUST_LOG` overrides the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("socket_client_manager=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

impl TestServer {
    async fn start() -> Result<Self> {
        init_logging();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut session = 0u32;
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(stream).await else {
                    continue;
                };

                session += 1;
                let sid = format!("sid-{session}");
                let handshake = Packet::Handshake {
                    sid: sid.clone(),
                    recovered: session > 1,
                };
                let Ok(text) = handshake.encode() else {
                    continue;
                };
                if ws.send(Message::Text(text.into())).await.is_err() {
                    continue;
                }
                if tx.send((sid, ws)).is_err() {
                    break;
                }
            }
        });

        Ok(Self { addr, accepted })
    }

    fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn next_client(&mut self) -> Result<(String, ServerSocket)> {
        timeout(WAIT, self.accepted.recv())
            .await
            .context("no client connected")?
            .ok_or_else(|| anyhow!("server stopped"))
    }
}

async fn send(ws: &mut ServerSocket, packet: &Packet) -> Result<()> {
    ws.send(Message::Text(packet.encode()?.into())).await?;
    Ok(())
}

async fn receive(ws: &mut ServerSocket) -> Result<Packet> {
    loop {
        let message = timeout(WAIT, ws.next())
            .await
            .context("no packet from client")?
            .ok_or_else(|| anyhow!("client went away"))??;

        match message {
            Message::Text(text) => return Ok(Packet::decode(&text)?),
            Message::Close(_) => bail!("client closed the socket"),
            _ => {}
        }
    }
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Result<T> {
    timeout(WAIT, rx.recv())
        .await
        .context("timed out waiting for event")?
        .ok_or_else(|| anyhow!("event channel closed"))
}

fn fast_options() -> ClientSocketManagerOptions {
    ClientSocketManagerOptions::new()
        .with_reconnection_delay(Duration::from_millis(10))
        .with_reconnection_delay_max(Duration::from_millis(50))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn connects_and_reports_session_id() -> Result<()> {
    let mut server = TestServer::start().await?;
    let (tx, mut connected) = mpsc::unbounded_channel();

    let handlers = EventHandlers::new().with_socket_connection(move |client| {
        let _ = tx.send(client.id());
    });
    let client = ClientSocketManager::new(
        server.uri(),
        fast_options()
            .with_event_handlers(handlers)
            .with_devtool(DevtoolOptions::enabled()),
    );

    let (sid, _ws) = server.next_client().await?;
    assert_eq!(recv(&mut connected).await?, Some(sid.clone()));

    assert!(client.connected());
    assert_eq!(client.id(), Some(sid));
    assert!(client.auto_reconnectable());
    assert_eq!(
        client.devtool().map(|d| d.snapshot().status),
        Some(Status::Connected)
    );

    client.dispose();
    assert!(!client.connected());
    Ok(())
}

#[tokio::test]
async fn delivers_server_messages_to_subscribers() -> Result<()> {
    let mut server = TestServer::start().await?;
    let (tx, mut received) = mpsc::unbounded_channel::<(String, Vec<Value>)>();

    let any_tx = tx.clone();
    let handlers = EventHandlers::new().with_any_subscribed_message_received(
        move |_, channel, args| {
            let _ = any_tx.send((format!("any:{channel}"), args.to_vec()));
        },
    );
    let client = ClientSocketManager::new(server.uri(), fast_options().with_event_handlers(handlers));

    client.subscribe(
        "server/message",
        move |args| {
            let _ = tx.send(("callback".to_string(), args.to_vec()));
        },
        SubscribeOptions::new(),
    )?;

    let (_, mut ws) = server.next_client().await?;
    send(
        &mut ws,
        &Packet::event("server/message", vec![json!("Hello from the server!")]),
    )
    .await?;

    let expected = vec![json!("Hello from the server!")];
    assert_eq!(
        recv(&mut received).await?,
        ("any:server/message".to_string(), expected.clone())
    );
    assert_eq!(recv(&mut received).await?, ("callback".to_string(), expected));

    client.dispose();
    Ok(())
}

#[tokio::test]
async fn forwards_client_emits_including_buffered_ones() -> Result<()> {
    let mut server = TestServer::start().await?;
    let client = ClientSocketManager::new(
        server.uri(),
        fast_options().with_auto_connect(false),
    );

    client.emit("client/message", vec![json!("queued")]);
    client.connect();

    let (_, mut ws) = server.next_client().await?;
    assert_eq!(
        receive(&mut ws).await?,
        Packet::event("client/message", vec![json!("queued")])
    );

    client.emit("client/message", vec![json!({ "n": 2 })]);
    assert_eq!(
        receive(&mut ws).await?,
        Packet::event("client/message", vec![json!({ "n": 2 })])
    );

    client.dispose();
    Ok(())
}

#[tokio::test]
async fn client_disconnect_is_final() -> Result<()> {
    let mut server = TestServer::start().await?;
    let (tx, mut events) = mpsc::unbounded_channel();

    let connect_tx = tx.clone();
    let handlers = EventHandlers::new()
        .with_socket_connection(move |_| {
            let _ = connect_tx.send(None);
        })
        .with_socket_disconnection(move |_, reason, _| {
            let _ = tx.send(Some(reason));
        });
    let client = ClientSocketManager::new(server.uri(), fast_options().with_event_handlers(handlers));

    let (_, mut ws) = server.next_client().await?;
    assert_eq!(recv(&mut events).await?, None);

    client.disconnect();
    assert_eq!(
        recv(&mut events).await?,
        Some(DisconnectReason::IoClientDisconnect)
    );
    assert!(!client.connected());
    assert!(!client.auto_reconnectable());
    assert_eq!(receive(&mut ws).await?, Packet::Disconnect);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.accepted.try_recv().is_err());

    client.dispose();
    Ok(())
}

#[tokio::test]
async fn server_disconnect_triggers_manual_reconnect() -> Result<()> {
    let mut server = TestServer::start().await?;
    let (tx, mut events) = mpsc::unbounded_channel();

    let connect_tx = tx.clone();
    let handlers = EventHandlers::new()
        .with_socket_connection(move |client| {
            let _ = connect_tx.send(format!("connect:{}", client.id().unwrap_or_default()));
        })
        .with_socket_disconnection(move |_, reason, _| {
            let _ = tx.send(format!("disconnect:{reason}"));
        });
    let client = ClientSocketManager::new(server.uri(), fast_options().with_event_handlers(handlers));

    let (_, mut first) = server.next_client().await?;
    assert_eq!(recv(&mut events).await?, "connect:sid-1");

    send(&mut first, &Packet::Disconnect).await?;
    assert_eq!(recv(&mut events).await?, "disconnect:io server disconnect");

    let (_, _second) = server.next_client().await?;
    assert_eq!(recv(&mut events).await?, "connect:sid-2");
    assert!(client.recovered());

    client.dispose();
    Ok(())
}

#[tokio::test]
async fn lost_connection_is_recovered_by_transport() -> Result<()> {
    let mut server = TestServer::start().await?;
    let (tx, mut events) = mpsc::unbounded_channel();

    let attempt_tx = tx.clone();
    let disconnect_tx = tx.clone();
    let handlers = EventHandlers::new()
        .with_socket_disconnection(move |_, reason, _| {
            let _ = disconnect_tx.send(format!("disconnect:{reason}"));
        })
        .with_reconnecting(move |_, attempt| {
            let _ = attempt_tx.send(format!("reconnecting:{attempt}"));
        })
        .with_successful_reconnection(move |_, attempt| {
            let _ = tx.send(format!("reconnected:{attempt}"));
        });
    let client = ClientSocketManager::new(
        server.uri(),
        fast_options()
            .with_event_handlers(handlers)
            .with_devtool(DevtoolOptions::enabled()),
    );

    let (_, mut first) = server.next_client().await?;
    first.close(None).await?;
    drop(first);

    assert_eq!(recv(&mut events).await?, "disconnect:transport close");
    assert_eq!(recv(&mut events).await?, "reconnecting:1");

    let (_, _second) = server.next_client().await?;
    assert_eq!(recv(&mut events).await?, "reconnected:1");
    assert!(client.connected());

    let logs = client
        .devtool()
        .map(|d| d.snapshot().logs.values())
        .unwrap_or_default();
    assert!(logs.iter().any(|log| log.kind == LogType::Reconnecting));
    assert!(logs.iter().any(|log| {
        log.kind == LogType::SuccessfulReconnection
            && log.detail == "Successfully connected after 1 attempt(s)"
    }));

    client.dispose();
    Ok(())
}

#[tokio::test]
async fn ping_is_answered_and_reported() -> Result<()> {
    let mut server = TestServer::start().await?;
    let (tx, mut pings) = mpsc::unbounded_channel();

    let handlers = EventHandlers::new().with_server_ping(move |_| {
        let _ = tx.send(());
    });
    let client = ClientSocketManager::new(server.uri(), fast_options().with_event_handlers(handlers));

    let (_, mut ws) = server.next_client().await?;
    send(&mut ws, &Packet::Ping).await?;

    assert_eq!(receive(&mut ws).await?, Packet::Pong);
    recv(&mut pings).await?;

    client.dispose();
    Ok(())
}

#[tokio::test]
async fn unreachable_server_reports_connection_errors() -> Result<()> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let (tx, mut errors) = mpsc::unbounded_channel();
    let socket_tx = tx.clone();
    let handlers = EventHandlers::new()
        .with_connection_error(move |_, _| {
            let _ = tx.send("manager");
        })
        .with_socket_connection_error(move |_, _| {
            let _ = socket_tx.send("socket");
        });
    let client = ClientSocketManager::new(
        format!("http://{addr}"),
        fast_options()
            .with_reconnection(false)
            .with_event_handlers(handlers),
    );

    assert_eq!(recv(&mut errors).await?, "manager");
    assert_eq!(recv(&mut errors).await?, "socket");
    assert!(!client.connected());

    client.dispose();
    Ok(())
}

#[test]
fn construction_outside_runtime_degrades() {
    let client = ClientSocketManager::new("http://localhost:3000", ClientSocketManagerOptions::new());

    assert!(!client.connected());
    assert_eq!(client.id(), None);
    assert_eq!(client.subscribe("chat", |_| {}, SubscribeOptions::new()).ok(), Some(None));
    client.dispose();
    assert!(client.disposed());
}
