//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central management system for all client
//! connections, handling connection lifecycle, session assignment and
//! room-scoped message delivery.

use super::{client::ClientConnection, ConnectionId, ConnectionSession};
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{error, info};
use world_core::WorldId;

/// Write half of a client's WebSocket.
pub type WsSender = Arc<Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>;

/// Central manager for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique IDs,
/// remembers which world each connection joined, and queues outgoing
/// messages for the connection handlers to deliver.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Implements atomic connection ID generation
/// * Provides a broadcast channel for outgoing messages; each connection's
///   outgoing task picks out the messages addressed to it
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// WebSocket write halves, used to close connections from the server side
    ws_senders: Arc<RwLock<HashMap<ConnectionId, WsSender>>>,

    /// Atomic counter for generating unique connection IDs
    next_id: Arc<AtomicUsize>,

    /// Broadcast sender for outgoing messages to specific connections
    sender: broadcast::Sender<(ConnectionId, Vec<u8>)>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            ws_senders: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    ///
    /// # Returns
    ///
    /// A unique `ConnectionId` assigned to this connection.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Register the WebSocket sender for a connection
    pub async fn register_ws_sender(&self, connection_id: ConnectionId, ws_sender: WsSender) {
        let mut senders = self.ws_senders.write().await;
        senders.insert(connection_id, ws_sender);
    }

    /// Remove the WebSocket sender for a connection
    pub async fn remove_ws_sender(&self, connection_id: ConnectionId) {
        let mut senders = self.ws_senders.write().await;
        senders.remove(&connection_id);
    }

    /// Sends a close frame to every open connection.
    ///
    /// Used during shutdown; the connection handlers notice the close and
    /// run their own cleanup.
    pub async fn close_all(&self, reason: &str) -> usize {
        let senders: Vec<WsSender> = self.ws_senders.read().await.values().cloned().collect();
        for ws_sender in &senders {
            let mut ws_sender = ws_sender.lock().await;
            let close_msg = Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: reason.to_string().into(),
            }));
            let _ = ws_sender.send(close_msg).await;
        }
        senders.len()
    }

    /// Removes a connection from the manager.
    ///
    /// # Returns
    ///
    /// The removed connection, so the caller can clean up the room it joined.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Option<ClientConnection> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&connection_id);
        if let Some(connection) = &removed {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
        removed
    }

    /// Attaches a joined session to a connection, returning the session it
    /// replaces.
    pub async fn set_session(
        &self,
        connection_id: ConnectionId,
        session: ConnectionSession,
    ) -> Option<ConnectionSession> {
        let mut connections = self.connections.write().await;
        connections
            .get_mut(&connection_id)
            .and_then(|connection| connection.session.replace(session))
    }

    /// Detaches the session from a connection.
    pub async fn clear_session(&self, connection_id: ConnectionId) -> Option<ConnectionSession> {
        let mut connections = self.connections.write().await;
        connections
            .get_mut(&connection_id)
            .and_then(|connection| connection.session.take())
    }

    /// The session a connection joined, if any.
    pub async fn session(&self, connection_id: ConnectionId) -> Option<ConnectionSession> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .and_then(|connection| connection.session.clone())
    }

    /// Connections currently joined to `world_id`, with their GM flag.
    pub async fn members_of(&self, world_id: WorldId) -> Vec<(ConnectionId, bool)> {
        let connections = self.connections.read().await;
        let mut members: Vec<(ConnectionId, bool)> = connections
            .iter()
            .filter_map(|(id, connection)| {
                connection
                    .session
                    .as_ref()
                    .filter(|session| session.world_id == world_id)
                    .map(|session| (*id, session.is_admin()))
            })
            .collect();
        members.sort_unstable();
        members
    }

    /// Sends a message to a specific connection.
    ///
    /// Queues a message for delivery to the specified connection through
    /// the internal broadcast channel.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, message: Vec<u8>) {
        if let Err(e) = self.sender.send((connection_id, message)) {
            error!("Failed to send message to connection {}: {:?}", connection_id, e);
        }
    }

    /// Sends a message to every connection joined to `world_id`.
    ///
    /// # Arguments
    ///
    /// * `world_id` - The room to deliver to
    /// * `message` - The message data
    /// * `except` - A connection to skip, usually the sender
    ///
    /// # Returns
    ///
    /// The number of connections that the message was queued for.
    pub async fn broadcast_to_world(
        &self,
        world_id: WorldId,
        message: Vec<u8>,
        except: Option<ConnectionId>,
    ) -> usize {
        let mut sent = 0;
        for (connection_id, _) in self.members_of(world_id).await {
            if Some(connection_id) == except {
                continue;
            }
            self.send_to_connection(connection_id, message.clone()).await;
            sent += 1;
        }
        sent
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Subscribes to the outgoing message stream.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, Vec<u8>)> {
        self.sender.subscribe()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_core::{SessionUser, User};

    fn session(world_id: WorldId, id: &str, is_admin: bool) -> ConnectionSession {
        let user = User::new(id, id);
        ConnectionSession {
            session_user: SessionUser {
                discord_id: user.discord_id.clone(),
                name: user.name.clone(),
                is_allowed: true,
                is_admin,
            },
            user,
            world_id,
        }
    }

    #[tokio::test]
    async fn broadcasts_reach_only_the_joined_room() {
        let manager = ConnectionManager::new();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let world = WorldId::new();

        let gm = manager.add_connection(addr).await;
        let player = manager.add_connection(addr).await;
        let elsewhere = manager.add_connection(addr).await;
        let lobby = manager.add_connection(addr).await;
        manager.set_session(gm, session(world, "gm", true)).await;
        manager.set_session(player, session(world, "p", false)).await;
        manager
            .set_session(elsewhere, session(WorldId::new(), "x", false))
            .await;

        assert_eq!(manager.members_of(world).await, vec![(gm, true), (player, false)]);

        let mut receiver = manager.subscribe();
        let sent = manager
            .broadcast_to_world(world, b"hello".to_vec(), Some(gm))
            .await;
        assert_eq!(sent, 1);
        assert_eq!(receiver.recv().await.unwrap(), (player, b"hello".to_vec()));
        assert!(receiver.try_recv().is_err());
        assert!(manager.session(lobby).await.is_none());
    }

    #[tokio::test]
    async fn removing_a_connection_returns_its_session() {
        let manager = ConnectionManager::new();
        let world = WorldId::new();
        let id = manager.add_connection("127.0.0.1:9000".parse().unwrap()).await;
        manager.set_session(id, session(world, "gm", true)).await;

        let removed = manager.remove_connection(id).await.unwrap();
        assert_eq!(removed.world_id(), Some(world));
        assert_eq!(manager.connection_count().await, 0);
        assert!(manager.remove_connection(id).await.is_none());
    }
}
