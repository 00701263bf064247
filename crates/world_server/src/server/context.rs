//! Shared state handed to every connection handler.

use crate::{
    config::ServerConfig,
    connection::{ConnectionId, ConnectionManager},
    error::ServerError,
    messaging::ServerMessage,
};
use std::sync::Arc;
use world_core::{DiceLogBook, MembershipGate, MembershipStore, RoomRegistry, WorldId};

/// Everything a message handler needs: the gate, the rooms, the dice log and
/// the connections to reply through.
#[derive(Debug)]
pub struct ServerContext {
    pub gate: MembershipGate,
    pub rooms: Arc<RoomRegistry>,
    pub dice: Arc<DiceLogBook>,
    pub connections: Arc<ConnectionManager>,
    pub max_dice: u32,
}

impl ServerContext {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn MembershipStore>,
        rooms: Arc<RoomRegistry>,
        dice: Arc<DiceLogBook>,
    ) -> Self {
        Self {
            gate: MembershipGate::with_scope(store, config.bootstrap_scope),
            rooms,
            dice,
            connections: Arc::new(ConnectionManager::new()),
            max_dice: config.max_dice,
        }
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        self.gate.store()
    }

    /// Queues `message` for one connection.
    pub async fn send(
        &self,
        connection_id: ConnectionId,
        message: &ServerMessage,
    ) -> Result<(), ServerError> {
        self.connections
            .send_to_connection(connection_id, message.to_bytes()?)
            .await;
        Ok(())
    }

    /// Queues `message` for everyone in a room, optionally skipping one
    /// connection.
    pub async fn broadcast(
        &self,
        world_id: WorldId,
        message: &ServerMessage,
        except: Option<ConnectionId>,
    ) -> Result<usize, ServerError> {
        Ok(self
            .connections
            .broadcast_to_world(world_id, message.to_bytes()?, except)
            .await)
    }
}
