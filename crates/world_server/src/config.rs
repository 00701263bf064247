//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize the world server.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use world_core::BootstrapScope;

/// Configuration structure for the world server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Seconds a connection may stay silent before it is closed (0 disables)
    pub connection_timeout: u64,

    /// Which memberships block bootstrapping a world
    pub bootstrap_scope: BootstrapScope,

    /// Largest dice pool a single roll may request
    pub max_dice: u32,

    /// Dice log entries kept per room
    pub dice_log_capacity: usize,

    /// Security configuration settings
    pub security: SecurityConfig,
}

/// Security configuration for input validation and abuse protection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable rate limiting
    pub enable_rate_limiting: bool,

    /// Maximum messages per second per IP (cursor updates are chatty)
    pub max_messages_per_second: u32,

    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Maximum allowed nesting depth for JSON messages
    pub max_json_depth: usize,

    /// Maximum allowed string length in JSON (character sheet text included)
    pub max_string_length: usize,

    /// Maximum allowed array/object size
    pub max_collection_size: usize,

    /// Banned IP addresses
    pub banned_ips: Vec<IpAddr>,

    /// Maximum concurrent connections per IP
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 256,
            connection_timeout: 300,
            bootstrap_scope: BootstrapScope::Global,
            max_dice: 20,
            dice_log_capacity: 500,
            security: SecurityConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            max_messages_per_second: 60,
            max_message_size: 256 * 1024, // 256KB, whole clock lists and sheets
            max_json_depth: 8,
            max_string_length: 16 * 1024,
            max_collection_size: 256,
            banned_ips: Vec::new(),
            max_connections_per_ip: 16,
        }
    }
}
