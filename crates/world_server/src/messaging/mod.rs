//! Message handling and routing for client-server communication.
//!
//! This module provides the infrastructure for parsing client messages,
//! running them against a world's room, and fanning the results out to the
//! other connections in that room.

pub mod router;
pub mod types;

pub use router::route_client_message;
pub use types::{ClientMessage, ErrorBody, ServerMessage};
