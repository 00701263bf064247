//! JSON snapshots of server state.
//!
//! A snapshot captures memberships, every room's storage and the dice logs so
//! a restarted server picks up where it left off. Presence is never saved.

use crate::dice::{DiceLog, DiceLogBook};
use crate::room::{RoomRegistry, RoomStorage};
use crate::store::{MembershipStore, MemoryMembershipStore, StoreError};
use crate::types::{current_timestamp, Membership, World};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    Version(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub world: World,
    pub storage: RoomStorage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: u64,
    pub worlds: Vec<WorldSnapshot>,
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub dice_logs: Vec<DiceLog>,
}

/// State rebuilt from a snapshot.
#[derive(Debug)]
pub struct RestoredState {
    pub store: MemoryMembershipStore,
    pub rooms: RoomRegistry,
    pub dice: DiceLogBook,
}

impl Snapshot {
    /// Captures the current state.
    pub async fn capture(
        store: &dyn MembershipStore,
        rooms: &RoomRegistry,
        dice: &DiceLogBook,
    ) -> Result<Self, SnapshotError> {
        let memberships = store.all().await?;
        let mut worlds = Vec::new();
        for (world_id, storage) in rooms.storages().await {
            if let Some(world) = rooms.world(world_id) {
                worlds.push(WorldSnapshot { world, storage });
            }
        }

        Ok(Self {
            version: SNAPSHOT_VERSION,
            saved_at: current_timestamp(),
            worlds,
            memberships,
            dice_logs: dice.all().await,
        })
    }

    /// Reads a snapshot, returning `None` when the file does not exist.
    pub async fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(snapshot.version));
        }
        Ok(Some(snapshot))
    }

    /// Writes the snapshot through a temporary file so a crash mid-write
    /// leaves the previous snapshot intact.
    pub async fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        info!(
            "💾 Saved snapshot: {} world(s), {} membership(s), {} roll(s) -> {}",
            self.worlds.len(),
            self.memberships.len(),
            self.dice_logs.len(),
            path.display()
        );
        Ok(())
    }

    /// Rebuilds live state. Duplicate memberships are rejected.
    pub async fn restore(self, dice_capacity: usize) -> Result<RestoredState, SnapshotError> {
        let store = MemoryMembershipStore::from_memberships(self.memberships)?;
        let rooms = RoomRegistry::new();
        for WorldSnapshot { world, storage } in self.worlds {
            rooms.register_with_storage(world, storage);
        }
        let dice = DiceLogBook::new(dice_capacity);
        for entry in self.dice_logs {
            dice.push(entry).await;
        }
        Ok(RestoredState { store, rooms, dice })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::RollRequest;
    use crate::types::{DiscordId, Role};
    use tempfile::TempDir;

    #[tokio::test]
    async fn snapshot_survives_a_restart() {
        let store = MemoryMembershipStore::new();
        let rooms = RoomRegistry::new();
        let dice = DiceLogBook::new(100);
        let world = World::new("Ashfall", "Cinders");
        let gm = DiscordId::new("gm");

        store.create(world.id, &gm, Role::Gm).await.unwrap();
        let room = rooms.register_world(world.clone());
        let clock = room.write().await.add_clock();
        dice.roll(world.id, &gm, "GM", RollRequest::new(2, "doom", 10).unwrap())
            .await;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("snapshot.json");
        Snapshot::capture(&store, &rooms, &dice)
            .await
            .unwrap()
            .save(&path)
            .await
            .unwrap();

        let restored = Snapshot::load(&path)
            .await
            .unwrap()
            .expect("snapshot written above")
            .restore(100)
            .await
            .unwrap();

        let membership = restored.store.find_unique(world.id, &gm).await.unwrap();
        assert_eq!(membership.map(|m| m.role), Some(Role::Gm));
        let room = restored.rooms.room(world.id).unwrap();
        assert_eq!(room.read().await.storage().clocks, vec![clock]);
        assert_eq!(restored.rooms.world(world.id), Some(world.clone()));
        assert_eq!(restored.dice.recent(world.id, 20).await.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let loaded = Snapshot::load(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn unknown_versions_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        tokio::fs::write(
            &path,
            r#"{"version": 99, "saved_at": 0, "worlds": [], "memberships": []}"#,
        )
        .await
        .unwrap();

        assert!(matches!(
            Snapshot::load(&path).await,
            Err(SnapshotError::Version(99))
        ));
    }
}
