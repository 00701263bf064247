//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections, including
//! connection tracking, the session each connection joined, and per-room
//! message delivery.

pub mod client;
pub mod manager;

pub use client::{ClientConnection, ConnectionSession};
pub use manager::ConnectionManager;

/// Type alias for connection identifiers.
///
/// Connection IDs double as presence keys inside a room, so two tabs opened
/// by the same user show up as two cursors.
pub type ConnectionId = usize;
