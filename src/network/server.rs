//! WebSocket Command Server
//!
//! Accepts WebSocket connections, feeds submitted commands to the
//! [`Dispatcher`] and pushes inbox notifications to subscribed clients.
//! Holds no game state of its own.
//!
//! # Environment Variables
//!
//! - `BIND_ADDR`: listen address (default: `0.0.0.0:8080`)
//! - `MAX_CONNECTIONS`: concurrent connection cap (default: `1000`)
//! - `IDLE_TIMEOUT_SECS`: close connections silent for this long (default: `300`)

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::clock::Clock;
use crate::core::config::{read_var, ConfigError};
use crate::dispatch::Dispatcher;
use crate::game::events::Delivery;
use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::store::MemoryStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close a connection after this long without a frame.
    pub idle_timeout: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with any environment variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let idle_secs = read_var(&lookup, "IDLE_TIMEOUT_SECS", defaults.idle_timeout.as_secs())?;

        Ok(Self {
            bind_addr: read_var(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            max_connections: read_var(&lookup, "MAX_CONNECTIONS", defaults.max_connections)?,
            idle_timeout: Duration::from_secs(idle_secs),
            version: defaults.version,
        })
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Player whose inbox this connection follows.
    subscribed: Option<PlayerId>,
    /// Connection time.
    connected_at: Instant,
}

/// Shared handles each connection task needs.
#[derive(Clone)]
struct ConnectionContext {
    dispatcher: Arc<Dispatcher>,
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    idle_timeout: Duration,
}

/// The command server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared connection state.
    context: ConnectionContext,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new server over an existing dispatcher and store.
    pub fn new(
        config: ServerConfig,
        dispatcher: Arc<Dispatcher>,
        store: Arc<MemoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let idle_timeout = config.idle_timeout;

        Self {
            config,
            context: ConnectionContext {
                dispatcher,
                store,
                clock,
                clients: Arc::new(RwLock::new(BTreeMap::new())),
                idle_timeout,
            },
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Command server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.context.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                Self::reject_overloaded(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Tell an over-limit client why it is being dropped.
    fn reject_overloaded(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let Ok(mut ws) = accept_async(stream).await else {
                return;
            };
            let refusal = ServerMessage::error(ErrorCode::ServerOverloaded, "connection limit reached");
            if let Ok(text) = refusal.to_json() {
                let _ = ws.send(Message::Text(text)).await;
            }
            let _ = ws.close(None).await;
            debug!("Refused {}", addr);
        });
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = self.context.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            ctx.clients.write().await.insert(
                addr,
                ConnectedClient { subscribed: None, connected_at: Instant::now() },
            );

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let mut feed: Option<(PlayerId, broadcast::Receiver<Delivery>)> = None;
            // Only client frames count as activity; pushed notifications do not.
            let mut idle_deadline = tokio::time::Instant::now() + ctx.idle_timeout;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        idle_deadline = tokio::time::Instant::now() + ctx.idle_timeout;
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx
                                            .send(ServerMessage::error(ErrorCode::InvalidMessage, e.to_string()))
                                            .await;
                                        continue;
                                    }
                                };

                                Self::handle_client_message(addr, client_msg, &ctx, &mut feed, &msg_tx).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx
                                    .send(ServerMessage::error(ErrorCode::InvalidMessage, "binary frames are not supported"))
                                    .await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    delivery = next_delivery(&mut feed) => {
                        match delivery {
                            Ok(delivery) => {
                                let Some((player, _)) = &feed else { continue };
                                if delivery.recipient == *player {
                                    let _ = msg_tx.send(ServerMessage::Notification {
                                        user_id: delivery.recipient,
                                        notification: delivery.notification,
                                    }).await;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("Client {} lagged, {} deliveries skipped", addr, skipped);
                                let _ = msg_tx
                                    .send(ServerMessage::error(
                                        ErrorCode::FeedLagged,
                                        "notifications were skipped; subscribe again to resync",
                                    ))
                                    .await;
                            }
                            Err(RecvError::Closed) => feed = None,
                        }
                    }
                    _ = tokio::time::sleep_until(idle_deadline) => {
                        info!("Closing idle client {}", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued replies flush, then close.
            drop(msg_tx);
            let _ = sender_task.await;

            if let Some(client) = ctx.clients.write().await.remove(&addr) {
                debug!(
                    "Client {} ({:?}) connected for {:?}",
                    addr,
                    client.subscribed.as_ref().map(PlayerId::as_str),
                    client.connected_at.elapsed()
                );
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        ctx: &ConnectionContext,
        feed: &mut Option<(PlayerId, broadcast::Receiver<Delivery>)>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Submit { command } => {
                let result = ctx.dispatcher.submit(&command).await;
                let _ = sender.send(ServerMessage::for_result(command.command_id, result)).await;
            }
            ClientMessage::Subscribe { user_id } => {
                let (backlog, rx) = ctx.store.follow(&user_id).await;

                if let Some(client) = ctx.clients.write().await.get_mut(&addr) {
                    client.subscribed = Some(user_id.clone());
                }

                let _ = sender
                    .send(ServerMessage::Subscribed { user_id: user_id.clone(), backlog: backlog.len() })
                    .await;
                for notification in backlog {
                    let _ = sender
                        .send(ServerMessage::Notification { user_id: user_id.clone(), notification })
                        .await;
                }

                debug!("Client {} following {}", addr, user_id);
                *feed = Some((user_id, rx));
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender
                    .send(ServerMessage::Pong { timestamp, server_time: ctx.clock.now_ms() })
                    .await;
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.context.clients.read().await.len()
    }
}

/// Next live delivery, or never when not subscribed.
async fn next_delivery(
    feed: &mut Option<(PlayerId, broadcast::Receiver<Delivery>)>,
) -> Result<Delivery, RecvError> {
    match feed {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}
