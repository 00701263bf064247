//! Client connection representation.
//!
//! This module defines the state tracked for each connected client: where it
//! connected from and, once the membership gate has admitted it, which world
//! it joined and as whom.

use std::net::SocketAddr;
use std::time::SystemTime;
use world_core::{SessionUser, User, WorldId};

/// The world a connection joined and the identity it joined as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSession {
    /// Identity supplied at join time
    pub user: User,

    /// World (and room) the connection is attached to
    pub world_id: WorldId,

    /// What the gate decided for this user
    pub session_user: SessionUser,
}

impl ConnectionSession {
    pub fn is_admin(&self) -> bool {
        self.session_user.is_admin
    }
}

/// Represents an individual client connection to the server.
///
/// # Fields
///
/// * `remote_addr` - The network address of the connected client
/// * `connected_at` - Timestamp when the connection was established
/// * `session` - Set after a successful `session:join`
#[derive(Debug)]
pub struct ClientConnection {
    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,

    /// The joined session, if any
    pub session: Option<ConnectionSession>,
}

impl ClientConnection {
    /// Creates a new client connection with the specified remote address.
    ///
    /// The connection starts without a session; world-scoped messages are
    /// refused until it joins a world.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            connected_at: SystemTime::now(),
            session: None,
        }
    }

    pub fn world_id(&self) -> Option<WorldId> {
        self.session.as_ref().map(|s| s.world_id)
    }
}
