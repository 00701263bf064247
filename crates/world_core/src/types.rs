//! # Core Type Definitions
//!
//! The identifiers and records shared by every part of Charge Worlds.
//!
//! ## Key Types
//!
//! - [`WorldId`] - Unique identifier for a campaign world (and its room)
//! - [`DiscordId`] - External identity of a user, issued by Discord
//! - [`User`] / [`World`] - The two records the membership gate is asked about
//! - [`Membership`] / [`Role`] - The (world, user) relationship the gate guards

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a world.
///
/// A wrapper around UUID so world ids cannot be confused with character or
/// clock ids, which are plain UUIDs on the wire.
///
/// # Examples
///
/// ```rust
/// use world_core::WorldId;
///
/// let world_id = WorldId::new();
/// let parsed: WorldId = world_id.to_string().parse()?;
/// assert_eq!(world_id, parsed);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    /// Creates a new random world ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for WorldId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External identifier of an authenticated user.
///
/// Users are authenticated by Discord before they reach this server; the id
/// is opaque here and only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscordId(pub String);

impl DiscordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DiscordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier from the identity provider
    pub discord_id: DiscordId,
    /// Display name, shown next to live cursors and dice rolls
    pub name: String,
}

impl User {
    pub fn new(discord_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            discord_id: DiscordId::new(discord_id),
            name: name.into(),
        }
    }
}

/// A campaign world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    pub description: String,
}

impl World {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: WorldId::new(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Role a user holds in a world.
///
/// The gate only ever assigns [`Role::Gm`]; other roles come from the
/// explicit grant path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "GM")]
    Gm,
    #[serde(rename = "PLAYER")]
    Player,
}

impl Role {
    pub fn is_gm(&self) -> bool {
        matches!(self, Role::Gm)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Gm => f.write_str("GM"),
            Role::Player => f.write_str("PLAYER"),
        }
    }
}

/// Relationship between a world and a user.
///
/// At most one membership exists per (world, user) pair; stores enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub world_id: WorldId,
    pub user_discord_id: DiscordId,
    pub role: Role,
    /// Unix timestamp (seconds) of creation
    pub created_at: u64,
}

/// Gets the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_like_the_membership_table() {
        assert_eq!(serde_json::to_string(&Role::Gm).unwrap(), "\"GM\"");
        assert_eq!(serde_json::to_string(&Role::Player).unwrap(), "\"PLAYER\"");
        assert!(Role::Gm.is_gm());
        assert!(!Role::Player.is_gm());
    }

    #[test]
    fn world_id_parses_its_own_display() {
        let id = WorldId::new();
        assert_eq!(id.to_string().parse::<WorldId>().unwrap(), id);
        assert!("not-a-uuid".parse::<WorldId>().is_err());
    }

    #[test]
    fn discord_id_is_a_bare_string_on_the_wire() {
        let user = User::new("1234", "Ash");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["discord_id"], "1234");
        assert_eq!(json["name"], "Ash");
    }
}
