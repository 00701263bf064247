//! Shared room storage.
//!
//! Each world owns one room. The room holds the state every participant
//! edits together (the world sheet, clocks and characters) plus the live
//! presence of connected users. Rooms are created with their initial storage
//! the first time a world is registered.

use crate::characters::{visible_characters, Character, CharacterUpdate};
use crate::clocks::{ClockState, ClockUpdate};
use crate::presence::{Presence, PresenceKey};
use crate::types::{World, WorldId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_WORLD_NAME: &str = "New World";
pub const DEFAULT_WORLD_DESCRIPTION: &str = "A brand new world";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("world {0} not found")]
    WorldNotFound(WorldId),

    #[error("clock {0} not found")]
    ClockNotFound(String),

    #[error("character {0} not found")]
    CharacterNotFound(String),

    #[error("only the GM may {0}")]
    GmOnly(&'static str),
}

impl RoomError {
    pub fn status_code(&self) -> u16 {
        match self {
            RoomError::GmOnly(_) => 403,
            _ => 404,
        }
    }
}

/// The world sheet shown at the top of every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldInfo {
    pub name: String,
    pub description: String,
}

impl Default for WorldInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORLD_NAME.to_string(),
            description: DEFAULT_WORLD_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Collaboratively edited room state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomStorage {
    pub world: WorldInfo,
    pub clocks: Vec<ClockState>,
    pub characters: Vec<Character>,
}

impl RoomStorage {
    fn normalize(&mut self) {
        self.clocks.iter_mut().for_each(ClockState::normalize);
        self.characters.iter_mut().for_each(Character::normalize);
    }
}

/// A world's room: storage plus who is connected.
#[derive(Debug)]
pub struct Room {
    world_id: WorldId,
    storage: RoomStorage,
    presence: HashMap<PresenceKey, Presence>,
}

impl Room {
    pub fn new(world_id: WorldId, mut storage: RoomStorage) -> Self {
        storage.normalize();
        Self {
            world_id,
            storage,
            presence: HashMap::new(),
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    pub fn storage(&self) -> &RoomStorage {
        &self.storage
    }

    /// Storage as a given viewer may see it.
    pub fn view_for(&self, is_admin: bool) -> RoomStorage {
        RoomStorage {
            world: self.storage.world.clone(),
            clocks: self.storage.clocks.clone(),
            characters: visible_characters(&self.storage.characters, is_admin),
        }
    }

    pub fn update_world(&mut self, update: WorldUpdate) -> WorldInfo {
        if let Some(name) = update.name {
            self.storage.world.name = name;
        }
        if let Some(description) = update.description {
            self.storage.world.description = description;
        }
        self.storage.world.clone()
    }

    pub fn add_clock(&mut self) -> ClockState {
        let clock = ClockState::new();
        self.storage.clocks.push(clock.clone());
        clock
    }

    pub fn update_clock(&mut self, id: &str, update: ClockUpdate) -> Result<ClockState, RoomError> {
        let clock = self
            .storage
            .clocks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RoomError::ClockNotFound(id.to_string()))?;
        clock.apply(update);
        Ok(clock.clone())
    }

    pub fn remove_clock(&mut self, id: &str) -> Result<(), RoomError> {
        let before = self.storage.clocks.len();
        self.storage.clocks.retain(|c| c.id != id);
        if self.storage.clocks.len() == before {
            return Err(RoomError::ClockNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Replaces the whole clock list.
    pub fn set_clocks(&mut self, mut clocks: Vec<ClockState>) -> &[ClockState] {
        clocks.iter_mut().for_each(ClockState::normalize);
        self.storage.clocks = clocks;
        &self.storage.clocks
    }

    pub fn add_character(&mut self) -> Character {
        let character = Character::new();
        self.storage.characters.push(character.clone());
        character
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.storage.characters.iter().find(|c| c.id == id)
    }

    /// Applies a partial sheet update. Only the GM may change visibility, and
    /// players cannot edit sheets they cannot see.
    pub fn update_character(
        &mut self,
        id: &str,
        update: CharacterUpdate,
        is_admin: bool,
    ) -> Result<Character, RoomError> {
        if update.touches_visibility() && !is_admin {
            return Err(RoomError::GmOnly("hide characters"));
        }
        let character = self
            .storage
            .characters
            .iter_mut()
            .find(|c| c.id == id && (is_admin || !c.hidden))
            .ok_or_else(|| RoomError::CharacterNotFound(id.to_string()))?;
        character.apply(update);
        Ok(character.clone())
    }

    pub fn delete_character(&mut self, id: &str, is_admin: bool) -> Result<(), RoomError> {
        let position = self
            .storage
            .characters
            .iter()
            .position(|c| c.id == id && (is_admin || !c.hidden))
            .ok_or_else(|| RoomError::CharacterNotFound(id.to_string()))?;
        self.storage.characters.remove(position);
        Ok(())
    }

    pub fn set_presence(&mut self, key: PresenceKey, presence: Presence) {
        self.presence.insert(key, presence);
    }

    pub fn remove_presence(&mut self, key: PresenceKey) -> Option<Presence> {
        self.presence.remove(&key)
    }

    pub fn presences(&self) -> &HashMap<PresenceKey, Presence> {
        &self.presence
    }
}

/// All worlds known to the server and their rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    worlds: DashMap<WorldId, World>,
    rooms: DashMap<WorldId, Arc<RwLock<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a world, creating its room with initial storage. A world that
    /// is already registered keeps its room.
    pub fn register_world(&self, world: World) -> Arc<RwLock<Room>> {
        let storage = RoomStorage {
            world: WorldInfo {
                name: world.name.clone(),
                description: world.description.clone(),
            },
            ..Default::default()
        };
        self.register_with_storage(world, storage)
    }

    /// Registers a world with previously persisted storage.
    pub fn register_with_storage(&self, world: World, storage: RoomStorage) -> Arc<RwLock<Room>> {
        let world_id = world.id;
        self.worlds.entry(world_id).or_insert(world);
        self.rooms
            .entry(world_id)
            .or_insert_with(|| {
                debug!("🏠 Created room for world {}", world_id);
                Arc::new(RwLock::new(Room::new(world_id, storage)))
            })
            .clone()
    }

    pub fn world(&self, id: WorldId) -> Option<World> {
        self.worlds.get(&id).map(|w| w.clone())
    }

    /// Keeps the world record in step with the room's world sheet.
    pub fn rename_world(&self, id: WorldId, info: &WorldInfo) {
        if let Some(mut world) = self.worlds.get_mut(&id) {
            world.name = info.name.clone();
            world.description = info.description.clone();
        }
    }

    pub fn room(&self, id: WorldId) -> Result<Arc<RwLock<Room>>, RoomError> {
        self.rooms
            .get(&id)
            .map(|r| r.clone())
            .ok_or(RoomError::WorldNotFound(id))
    }

    pub fn worlds(&self) -> Vec<World> {
        let mut worlds: Vec<World> = self.worlds.iter().map(|w| w.clone()).collect();
        worlds.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        worlds
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    /// Current storage of every room, for snapshots.
    pub async fn storages(&self) -> Vec<(WorldId, RoomStorage)> {
        let rooms: Vec<(WorldId, Arc<RwLock<Room>>)> = self
            .rooms
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut storages = Vec::with_capacity(rooms.len());
        for (id, room) in rooms {
            storages.push((id, room.read().await.storage().clone()));
        }
        storages.sort_by_key(|(id, _)| *id);
        storages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Cursor;

    fn room() -> Room {
        Room::new(WorldId::new(), RoomStorage::default())
    }

    #[test]
    fn default_storage_is_a_brand_new_world() {
        let storage = RoomStorage::default();
        assert_eq!(storage.world.name, "New World");
        assert_eq!(storage.world.description, "A brand new world");
        assert!(storage.clocks.is_empty());
        assert!(storage.characters.is_empty());
    }

    #[test]
    fn clocks_can_be_added_updated_and_removed() {
        let mut room = room();
        let clock = room.add_clock();

        let updated = room
            .update_clock(
                &clock.id,
                ClockUpdate {
                    name: Some("Doom".to_string()),
                    progress: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Doom");
        assert_eq!(updated.progress, 3);

        assert_eq!(
            room.update_clock("missing", ClockUpdate::default()),
            Err(RoomError::ClockNotFound("missing".to_string()))
        );
        room.remove_clock(&clock.id).unwrap();
        assert!(room.storage().clocks.is_empty());
        assert!(room.remove_clock(&clock.id).is_err());
    }

    #[test]
    fn only_the_gm_hides_characters() {
        let mut room = room();
        let character = room.add_character();
        let hide = CharacterUpdate {
            hidden: Some(true),
            ..Default::default()
        };

        let err = room
            .update_character(&character.id, hide.clone(), false)
            .unwrap_err();
        assert_eq!(err, RoomError::GmOnly("hide characters"));
        assert_eq!(err.status_code(), 403);

        let hidden = room.update_character(&character.id, hide, true).unwrap();
        assert!(hidden.hidden);
        assert!(room.view_for(false).characters.is_empty());
        assert_eq!(room.view_for(true).characters.len(), 1);

        // Players cannot reach sheets they cannot see.
        assert!(room.delete_character(&character.id, false).is_err());
        room.delete_character(&character.id, true).unwrap();
        assert!(room.storage().characters.is_empty());
    }

    #[test]
    fn presence_is_tracked_per_connection() {
        let mut room = room();
        room.set_presence(
            1,
            Presence {
                cursor: Some(Cursor {
                    name: "Ash".to_string(),
                    x: 10.0,
                    y: 20.0,
                    route: "/".to_string(),
                }),
            },
        );
        room.set_presence(2, Presence::default());

        assert_eq!(room.presences().len(), 2);
        assert!(room.remove_presence(1).is_some());
        assert!(room.remove_presence(1).is_none());
    }

    #[tokio::test]
    async fn registering_a_world_twice_keeps_its_room() {
        let registry = RoomRegistry::new();
        let world = World::new("Ashfall", "Cinders everywhere");

        let room = registry.register_world(world.clone());
        room.write().await.add_clock();
        registry.register_world(world.clone());

        let again = registry.room(world.id).unwrap();
        assert_eq!(again.read().await.storage().clocks.len(), 1);
        assert_eq!(again.read().await.storage().world.name, "Ashfall");
        assert_eq!(registry.world_count(), 1);
        assert!(matches!(
            registry.room(WorldId::new()),
            Err(RoomError::WorldNotFound(_))
        ));
    }
}
