//! Factory functions for creating server instances.

use crate::{config::ServerConfig, server::WorldServer};

/// Creates a new world server with default configuration, an empty
/// membership store and no worlds.
///
/// # Example
///
/// ```rust
/// use world_server::create_server;
///
/// let server = create_server();
/// assert_eq!(server.context().rooms.world_count(), 0);
/// ```
pub fn create_server() -> WorldServer {
    WorldServer::with_config(ServerConfig::default())
}

/// Creates a new world server with custom configuration.
///
/// # Example
///
/// ```rust
/// use world_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_dice: 10,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// assert_eq!(server.context().max_dice, 10);
/// ```
pub fn create_server_with_config(config: ServerConfig) -> WorldServer {
    WorldServer::with_config(config)
}
