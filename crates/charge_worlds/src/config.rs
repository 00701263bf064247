//! Configuration management for the Charge Worlds server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;
use world_core::{BootstrapScope, World, WorldId};
use world_server::{SecurityConfig, ServerConfig};

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Membership gate settings
    #[serde(default)]
    pub gate: GateSettings,
    /// Worlds served by this deployment
    #[serde(default)]
    pub worlds: Vec<WorldSettings>,
    /// Snapshot and dice log settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Abuse protection
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle timeout in seconds (0 disables)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Largest dice pool a single roll may request
    #[serde(default = "default_max_dice")]
    pub max_dice: u32,
}

fn default_max_connections() -> usize {
    256
}

pub fn default_connection_timeout() -> u64 {
    300
}

fn default_max_dice() -> u32 {
    20
}

/// Membership gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    /// `global`: the first membership anywhere configures the deployment.
    /// `world`: each world bootstraps its own GM.
    #[serde(default = "default_bootstrap_scope")]
    pub bootstrap_scope: String,
}

fn default_bootstrap_scope() -> String {
    BootstrapScope::Global.to_string()
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            bootstrap_scope: default_bootstrap_scope(),
        }
    }
}

/// A world served by this deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Stable world id (UUID)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Snapshot file; state is kept in memory only when unset
    #[serde(default)]
    pub snapshot_path: Option<String>,
    /// Seconds between automatic snapshots (0 disables)
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
    /// Dice log entries kept per world
    #[serde(default = "default_dice_log_capacity")]
    pub dice_log_capacity: usize,
}

fn default_autosave_interval() -> u64 {
    300
}

fn default_dice_log_capacity() -> usize {
    500
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            snapshot_path: Some("data/snapshot.json".to_string()),
            autosave_interval_secs: default_autosave_interval(),
            dice_log_capacity: default_dice_log_capacity(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
                max_dice: default_max_dice(),
            },
            gate: GateSettings::default(),
            worlds: vec![WorldSettings {
                id: WorldId::new().to_string(),
                name: "New World".to_string(),
                description: "A brand new world".to_string(),
            }],
            storage: StorageSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            security: SecurityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration. The generated
    /// world id is written out so it stays stable across restarts.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a world server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            bootstrap_scope: self.gate.bootstrap_scope.parse()?,
            max_dice: self.server.max_dice,
            dice_log_capacity: self.storage.dice_log_capacity,
            security: self.security.clone(),
        })
    }

    /// The configured worlds as domain records.
    pub fn world_records(&self) -> Result<Vec<World>, Box<dyn std::error::Error>> {
        self.worlds
            .iter()
            .map(|w| -> Result<World, Box<dyn std::error::Error>> {
                Ok(World {
                    id: w.id.parse()?,
                    name: w.name.clone(),
                    description: w.description.clone(),
                })
            })
            .collect()
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.storage.snapshot_path.as_ref().map(PathBuf::from)
    }

    /// Validates the configuration for correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }
        if self.server.max_dice == 0 {
            return Err("server.max_dice must be greater than 0".to_string());
        }

        self.gate.bootstrap_scope.parse::<BootstrapScope>()?;

        if self.worlds.is_empty() {
            return Err("At least one [[worlds]] entry is required".to_string());
        }
        let mut seen = HashSet::new();
        for world in &self.worlds {
            let id: WorldId = world
                .id
                .parse()
                .map_err(|_| format!("Invalid world id: {}", world.id))?;
            if !seen.insert(id) {
                return Err(format!("Duplicate world id: {}", world.id));
            }
            if world.name.trim().is_empty() {
                return Err(format!("World {} must have a name", world.id));
            }
        }

        if self.storage.dice_log_capacity == 0 {
            return Err("storage.dice_log_capacity must be greater than 0".to_string());
        }
        if matches!(&self.storage.snapshot_path, Some(p) if p.trim().is_empty()) {
            return Err("storage.snapshot_path cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.max_connections, 256);
        assert_eq!(server_config.connection_timeout, 300);
        assert_eq!(server_config.bootstrap_scope, BootstrapScope::Global);
        assert_eq!(config.world_records().unwrap().len(), 1);
    }

    #[test]
    fn validation_catches_bad_settings() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.gate.bootstrap_scope = "galaxy".to_string();
        assert!(config.validate().unwrap_err().contains("bootstrap scope"));

        let mut config = AppConfig::default();
        config.worlds.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.worlds.push(config.worlds[0].clone());
        assert!(config.validate().unwrap_err().contains("Duplicate"));

        let mut config = AppConfig::default();
        config.worlds[0].id = "not-a-uuid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let created = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());

        // The generated world id survives a reload.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.worlds, created.worlds);
    }

    #[tokio::test]
    async fn partial_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let world_id = WorldId::new();
        tokio::fs::write(
            &path,
            format!(
                r#"
[server]
bind_address = "0.0.0.0:9000"

[gate]
bootstrap_scope = "world"

[[worlds]]
id = "{world_id}"
name = "Ashfall"

[logging]
level = "debug"
json_format = true

[security]
max_messages_per_second = 5
"#
            ),
        )
        .await
        .unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.max_dice, 20);
        assert_eq!(config.storage.dice_log_capacity, 500);
        assert_eq!(config.security.max_messages_per_second, 5);
        assert_eq!(config.security.max_connections_per_ip, 16);

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bootstrap_scope, BootstrapScope::World);
        assert_eq!(config.world_records().unwrap()[0].id, world_id);
        assert_eq!(config.world_records().unwrap()[0].description, "");
    }
}
