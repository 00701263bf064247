//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that restores world state,
//! runs the world server, snapshots state periodically and on shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{wait_for_shutdown_signal, wait_for_signal},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use world_core::{DiceLogBook, MemoryMembershipStore, RoomRegistry, Snapshot};
use world_server::{ServerContext, ShutdownState, WorldServer};

/// How long the server gets to close its connections after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(8);

/// Live state the server runs over, either fresh or restored from a snapshot.
#[derive(Debug)]
pub struct WorldState {
    pub store: Arc<MemoryMembershipStore>,
    pub rooms: Arc<RoomRegistry>,
    pub dice: Arc<DiceLogBook>,
}

impl WorldState {
    /// Restores state from `snapshot_path` when the file exists, then makes
    /// sure every configured world has a room.
    ///
    /// Worlds already present in the snapshot keep their stored sheet;
    /// configured worlds the snapshot does not know start empty.
    pub async fn load(
        config: &AppConfig,
        snapshot_path: Option<&Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let snapshot = match snapshot_path {
            Some(path) => Snapshot::load(path).await?,
            None => None,
        };

        let state = match snapshot {
            Some(snapshot) => {
                info!(
                    "📂 Restoring snapshot: {} world(s), {} membership(s), {} roll(s)",
                    snapshot.worlds.len(),
                    snapshot.memberships.len(),
                    snapshot.dice_logs.len()
                );
                let restored = snapshot.restore(config.storage.dice_log_capacity).await?;
                Self {
                    store: Arc::new(restored.store),
                    rooms: Arc::new(restored.rooms),
                    dice: Arc::new(restored.dice),
                }
            }
            None => Self {
                store: Arc::new(MemoryMembershipStore::new()),
                rooms: Arc::new(RoomRegistry::new()),
                dice: Arc::new(DiceLogBook::new(config.storage.dice_log_capacity)),
            },
        };

        for world in config.world_records()? {
            if state.rooms.world(world.id).is_none() {
                info!("🌍 Registering world '{}' ({})", world.name, world.id);
            }
            state.rooms.register_world(world);
        }

        Ok(state)
    }
}

/// Writes the server's current state to `path`.
pub async fn save_snapshot(
    ctx: &ServerContext,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = Snapshot::capture(ctx.store().as_ref(), &ctx.rooms, &ctx.dice).await?;
    snapshot.save(path).await?;
    Ok(())
}

/// Saves a snapshot to `path` every `interval_secs` seconds.
///
/// Returns `None` when there is nowhere to save or the interval is 0.
pub fn spawn_autosave(
    ctx: Arc<ServerContext>,
    path: Option<PathBuf>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    let path = path?;
    if interval_secs == 0 {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = save_snapshot(&ctx, &path).await {
                warn!("⚠️ Autosave failed: {}", e);
            }
        }
    }))
}

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the Charge
/// Worlds server: configuration, state restoration, the server itself,
/// autosaving and graceful shutdown.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Where state is persisted, if anywhere
    snapshot_path: Option<PathBuf>,
    /// World server instance
    server: WorldServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Restore the last snapshot and register configured worlds
    /// 5. Initialize the world server over that state
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(snapshot) = args.snapshot_path {
            config.storage.snapshot_path = Some(snapshot.to_string_lossy().to_string());
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let snapshot_path = config.snapshot_path();
        let state = WorldState::load(&config, snapshot_path.as_deref()).await?;
        let server = WorldServer::new(
            config.to_server_config()?,
            state.store,
            state.rooms,
            state.dice,
        );

        Ok(Self {
            config,
            snapshot_path,
            server,
        })
    }

    /// Runs the server until a termination signal, then shuts down in
    /// phases and writes the final snapshot.
    ///
    /// A second signal during shutdown exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Charge Worlds server");
        self.log_configuration_summary();

        let ctx = self.server.context();
        let shutdown_state = ShutdownState::new();

        let mut server_handle = {
            let server = self.server;
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move { server.start_with_shutdown_state(shutdown_state).await })
        };

        let autosave_handle = spawn_autosave(
            ctx.clone(),
            self.snapshot_path.clone(),
            self.config.storage.autosave_interval_secs,
        );

        info!("✅ Charge Worlds is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            finished = &mut server_handle => {
                if let Some(handle) = autosave_handle {
                    handle.abort();
                }
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        error!("❌ Server error: {}", e);
                        Err(e.into())
                    }
                    Err(e) => Err(e.into()),
                };
            }
            signal = wait_for_shutdown_signal(&shutdown_state) => signal?,
        }

        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again! Exiting without a final snapshot.");
            std::process::exit(1);
        });

        info!("📡 Phase 1: Closing connections...");
        if let Some(handle) = autosave_handle {
            handle.abort();
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Server stopped"),
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => {
                warn!("⏰ Server did not stop within {:?}", SHUTDOWN_GRACE);
                server_handle.abort();
            }
        }

        info!("💾 Phase 2: Writing final snapshot...");
        if let Some(path) = &self.snapshot_path {
            save_snapshot(&ctx, path).await?;
        } else {
            info!("No snapshot path configured - state is discarded");
        }

        info!("✅ Charge Worlds shutdown complete");
        Ok(())
    }

    /// Logs a summary of the current configuration settings.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Connection timeout: {}s", self.config.server.connection_timeout);
        info!("  🚪 Bootstrap scope: {}", self.config.gate.bootstrap_scope);
        info!("  🌍 Worlds: {}", self.config.worlds.len());
        info!("  🎲 Max dice per roll: {}", self.config.server.max_dice);
        match &self.snapshot_path {
            Some(path) => info!(
                "  💾 Snapshot: {} (autosave every {}s)",
                path.display(),
                self.config.storage.autosave_interval_secs
            ),
            None => info!("  💾 Snapshot: disabled"),
        }
        info!("  📝 Log level: {}", self.config.logging.level);
        info!(
            "  🛡️ Rate limiting: {}",
            if self.config.security.enable_rate_limiting {
                "enabled"
            } else {
                "disabled"
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldSettings;
    use tempfile::TempDir;
    use world_core::{
        ClockUpdate, DiscordId, MembershipStore, Role, RollRequest, SnapshotError, WorldId,
    };

    fn config_with_worlds(ids: &[WorldId]) -> AppConfig {
        let mut config = AppConfig::default();
        config.worlds = ids
            .iter()
            .enumerate()
            .map(|(i, id)| WorldSettings {
                id: id.to_string(),
                name: format!("World {i}"),
                description: String::new(),
            })
            .collect();
        config
    }

    #[tokio::test]
    async fn fresh_state_registers_configured_worlds() {
        let dir = TempDir::new().unwrap();
        let ids = [WorldId::new(), WorldId::new()];
        let config = config_with_worlds(&ids);

        let state = WorldState::load(&config, Some(&dir.path().join("missing.json")))
            .await
            .unwrap();

        assert_eq!(state.rooms.world_count(), 2);
        assert!(state.store.is_empty().await);
        let room = state.rooms.room(ids[1]).unwrap();
        assert_eq!(room.read().await.storage().world.name, "World 1");
    }

    #[tokio::test]
    async fn snapshot_state_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        let kept = WorldId::new();
        let config = config_with_worlds(&[kept]);

        let state = WorldState::load(&config, Some(&path)).await.unwrap();
        let user = DiscordId::new("1001");
        state.store.create(kept, &user, Role::Gm).await.unwrap();
        {
            let room = state.rooms.room(kept).unwrap();
            let mut room = room.write().await;
            let clock = room.add_clock();
            room.update_clock(
                &clock.id,
                ClockUpdate {
                    progress: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        state
            .dice
            .roll(kept, &user, "Ash", RollRequest::new(2, "Prowl", 20).unwrap())
            .await;
        let server = WorldServer::new(
            config.to_server_config().unwrap(),
            state.store,
            state.rooms,
            state.dice,
        );
        save_snapshot(&server.context(), &path).await.unwrap();

        // A world added to the configuration later starts fresh.
        let added = WorldId::new();
        let config = config_with_worlds(&[kept, added]);
        let restored = WorldState::load(&config, Some(&path)).await.unwrap();

        assert_eq!(restored.rooms.world_count(), 2);
        let membership = restored.store.find_unique(kept, &user).await.unwrap().unwrap();
        assert_eq!(membership.role, Role::Gm);
        let room = restored.rooms.room(kept).unwrap();
        assert_eq!(room.read().await.storage().clocks[0].progress, 3);
        assert_eq!(restored.dice.recent(kept, 20).await.len(), 1);
        let fresh = restored.rooms.room(added).unwrap();
        assert!(fresh.read().await.storage().clocks.is_empty());
    }

    #[tokio::test]
    async fn unknown_snapshot_version_is_a_startup_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        tokio::fs::write(
            &path,
            r#"{"version":99,"saved_at":0,"worlds":[],"memberships":[]}"#,
        )
        .await
        .unwrap();

        let err = WorldState::load(&AppConfig::default(), Some(&path))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::Version(99))
        ));
    }

    fn server_over(state: WorldState, config: &AppConfig) -> WorldServer {
        WorldServer::new(
            config.to_server_config().unwrap(),
            state.store,
            state.rooms,
            state.dice,
        )
    }

    #[tokio::test]
    async fn autosave_writes_snapshots_on_its_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autosave").join("snapshot.json");
        let config = AppConfig::default();
        let state = WorldState::load(&config, None).await.unwrap();
        let server = server_over(state, &config);

        let handle = spawn_autosave(server.context(), Some(path.clone()), 1).unwrap();
        let saved = tokio::time::timeout(Duration::from_secs(5), async {
            while !tokio::fs::try_exists(&path).await.unwrap() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        handle.abort();

        assert!(saved.is_ok(), "no snapshot written within 5s");
        let snapshot = Snapshot::load(&path).await.unwrap().unwrap();
        assert_eq!(snapshot.worlds.len(), 1);
    }

    #[tokio::test]
    async fn autosave_is_off_for_a_zero_interval_or_no_path() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();
        let state = WorldState::load(&config, None).await.unwrap();
        let server = server_over(state, &config);

        assert!(spawn_autosave(server.context(), Some(dir.path().join("s.json")), 0).is_none());
        assert!(spawn_autosave(server.context(), None, 1).is_none());
    }

    #[tokio::test]
    async fn without_a_snapshot_path_state_stays_in_memory() {
        let config = AppConfig::default();
        let state = WorldState::load(&config, None).await.unwrap();
        assert_eq!(state.rooms.world_count(), 1);
    }
}
