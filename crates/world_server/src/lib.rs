//! # World Server
//!
//! WebSocket server for Charge Worlds. It admits connections to worlds
//! through the membership gate and keeps every connection in a world's room
//! in step: world sheet, clocks, characters, dice rolls and cursors.
//!
//! ## Message Flow
//!
//! 1. Client sends a WebSocket message with `{namespace, event, data}` structure
//! 2. Server validates its size, shape and rate
//! 3. `session:join` runs the membership gate and attaches the connection to
//!    the world's room; a denial is answered with a 403 `error` envelope
//! 4. World-scoped messages are applied to the joined room (401 before a join)
//! 5. Results are broadcast to the room through the connection manager
//!
//! ## Events
//!
//! | Client sends | Server answers |
//! |---|---|
//! | `worlds:list` | `worlds:list` to the sender |
//! | `session:join` / `session:leave` | `session:joined` / `session:left`, `presence:updated` / `presence:left` to the room |
//! | `world:update` | `world:updated` to the room |
//! | `clocks:add` / `update` / `remove` / `set` | `clocks:updated` to the room |
//! | `characters:add` / `update` / `delete` | `characters:updated` to each member, filtered by role |
//! | `characters:roll`, `dice:roll` | `dice:rolled` to the room |
//! | `presence:cursor` / `presence:clear` | `presence:updated` to the rest of the room |
//!
//! ## Error Handling
//!
//! Failed requests are answered with `{"namespace": "error", "event":
//! "<namespace>:<event>", "data": {"status": ..., "message": ...}}`. Gate
//! denials carry status 403 and no message.

pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod utils;

pub use config::{SecurityConfig, ServerConfig};
pub use error::ServerError;
pub use messaging::{ClientMessage, ServerMessage};
pub use server::{ServerContext, WorldServer};
pub use shutdown::ShutdownState;
pub use utils::{create_server, create_server_with_config};
