//! Membership persistence.
//!
//! The gate talks to storage only through [`MembershipStore`]. The trait
//! mirrors the three round-trips the gate performs (a unique lookup, a
//! truncated count and a create) plus a full listing used for snapshots.
//! Implementations must enforce the (world, user) uniqueness constraint
//! atomically and report violations as [`StoreError::Conflict`].

use crate::types::{current_timestamp, DiscordId, Membership, Role, WorldId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors raised by a membership store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not serve the request
    #[error("membership store unavailable: {0}")]
    Unavailable(String),

    /// A membership for this (world, user) pair already exists
    #[error("membership for user {user} in world {world} already exists")]
    Conflict { world: WorldId, user: DiscordId },
}

/// Which memberships a count covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    /// Every membership in every world
    All,
    /// Only memberships of one world
    World(WorldId),
}

/// Storage operations consumed by the membership gate.
#[async_trait]
pub trait MembershipStore: Send + Sync + std::fmt::Debug {
    /// Looks up the membership for the exact (world, user) pair.
    async fn find_unique(
        &self,
        world_id: WorldId,
        user_id: &DiscordId,
    ) -> Result<Option<Membership>, StoreError>;

    /// Counts memberships in `scope`, stopping once `limit` rows were seen.
    async fn count(&self, scope: CountScope, limit: usize) -> Result<usize, StoreError>;

    /// Creates a membership. Fails with [`StoreError::Conflict`] if the pair
    /// already has one.
    async fn create(
        &self,
        world_id: WorldId,
        user_id: &DiscordId,
        role: Role,
    ) -> Result<Membership, StoreError>;

    /// Lists every membership, used when writing snapshots.
    async fn all(&self) -> Result<Vec<Membership>, StoreError>;
}

/// In-memory membership store.
///
/// Uniqueness is enforced under the write lock, so concurrent creates for the
/// same pair resolve to exactly one row.
#[derive(Debug, Default)]
pub struct MemoryMembershipStore {
    rows: Arc<RwLock<HashMap<(WorldId, DiscordId), Membership>>>,
    writes: AtomicU64,
}

impl MemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from previously persisted rows.
    ///
    /// Fails on the first duplicate (world, user) pair.
    pub fn from_memberships(memberships: Vec<Membership>) -> Result<Self, StoreError> {
        let mut rows = HashMap::with_capacity(memberships.len());
        for membership in memberships {
            let key = (membership.world_id, membership.user_discord_id.clone());
            if rows.contains_key(&key) {
                return Err(StoreError::Conflict {
                    world: membership.world_id,
                    user: membership.user_discord_id,
                });
            }
            rows.insert(key, membership);
        }
        Ok(Self {
            rows: Arc::new(RwLock::new(rows)),
            writes: AtomicU64::new(0),
        })
    }

    /// Number of successful creates since construction.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn find_unique(
        &self,
        world_id: WorldId,
        user_id: &DiscordId,
    ) -> Result<Option<Membership>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(world_id, user_id.clone())).cloned())
    }

    async fn count(&self, scope: CountScope, limit: usize) -> Result<usize, StoreError> {
        let rows = self.rows.read().await;
        let count = match scope {
            CountScope::All => rows.len().min(limit),
            CountScope::World(world_id) => rows
                .keys()
                .filter(|(world, _)| *world == world_id)
                .take(limit)
                .count(),
        };
        Ok(count)
    }

    async fn create(
        &self,
        world_id: WorldId,
        user_id: &DiscordId,
        role: Role,
    ) -> Result<Membership, StoreError> {
        let mut rows = self.rows.write().await;
        let key = (world_id, user_id.clone());
        if rows.contains_key(&key) {
            return Err(StoreError::Conflict {
                world: world_id,
                user: user_id.clone(),
            });
        }

        let membership = Membership {
            world_id,
            user_discord_id: user_id.clone(),
            role,
            created_at: current_timestamp(),
        };
        rows.insert(key, membership.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("🗝️ Stored membership {} -> {} as {}", user_id, world_id, role);
        Ok(membership)
    }

    async fn all(&self) -> Result<Vec<Membership>, StoreError> {
        let rows = self.rows.read().await;
        let mut memberships: Vec<Membership> = rows.values().cloned().collect();
        memberships.sort_by(|a, b| {
            (a.created_at, a.world_id, &a.user_discord_id)
                .cmp(&(b.created_at, b.world_id, &b.user_discord_id))
        });
        Ok(memberships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_rejects_duplicate_pairs() {
        let store = MemoryMembershipStore::new();
        let world = WorldId::new();
        let user = DiscordId::new("42");

        store.create(world, &user, Role::Gm).await.unwrap();
        let err = store.create(world, &user, Role::Player).await.unwrap_err();

        assert_eq!(err, StoreError::Conflict { world, user: user.clone() });
        assert_eq!(store.len().await, 1);
        assert_eq!(store.write_count(), 1);
        let row = store.find_unique(world, &user).await.unwrap().unwrap();
        assert_eq!(row.role, Role::Gm);
    }

    #[tokio::test]
    async fn count_is_truncated_and_scoped() {
        let store = MemoryMembershipStore::new();
        let w1 = WorldId::new();
        let w2 = WorldId::new();
        for id in ["a", "b", "c"] {
            store.create(w1, &DiscordId::new(id), Role::Player).await.unwrap();
        }

        assert_eq!(store.count(CountScope::All, 1).await.unwrap(), 1);
        assert_eq!(store.count(CountScope::All, 10).await.unwrap(), 3);
        assert_eq!(store.count(CountScope::World(w1), 2).await.unwrap(), 2);
        assert_eq!(store.count(CountScope::World(w2), 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn from_memberships_rejects_duplicates() {
        let world = WorldId::new();
        let row = Membership {
            world_id: world,
            user_discord_id: DiscordId::new("7"),
            role: Role::Gm,
            created_at: 1,
        };

        let store = MemoryMembershipStore::from_memberships(vec![row.clone()]).unwrap();
        assert_eq!(store.all().await.unwrap(), vec![row.clone()]);
        assert_eq!(store.write_count(), 0);

        let err = MemoryMembershipStore::from_memberships(vec![row.clone(), row]).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}
