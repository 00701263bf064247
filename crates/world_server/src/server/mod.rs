//! Core server implementation and connection handling.
//!
//! This module contains the main world server structure, the state it
//! shares with connection handlers, and the per-connection handling logic.

pub mod context;
pub mod core;
pub mod handlers;

pub use context::ServerContext;
pub use core::WorldServer;
