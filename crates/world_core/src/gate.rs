//! The membership gate.
//!
//! Every world-scoped request passes through [`MembershipGate::require_membership`]
//! before any world data is served. The gate returns the caller's existing
//! membership, bootstraps the very first one as a GM, or denies access.
//!
//! ## Bootstrap scope
//!
//! Whether the store counts as "unconfigured" is decided by a count truncated
//! at one row. With [`BootstrapScope::Global`] (the default) that count spans
//! every world, so once any world has a member no other world can bootstrap.
//! [`BootstrapScope::World`] restricts the count to the requested world.
//!
//! ## Concurrency
//!
//! Lookup, count and create are three independent store round-trips with no
//! transaction around them. Two first-access requests racing on an
//! unconfigured world both pass the count; the store's uniqueness constraint
//! lets one create succeed and the other fails with
//! [`StoreError::Conflict`], which is returned to the caller as is.

use crate::store::{CountScope, MembershipStore, StoreError};
use crate::types::{Membership, Role, User, World};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which memberships decide whether a world may be bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapScope {
    /// Any membership in any world blocks bootstrap everywhere
    #[default]
    Global,
    /// Only memberships of the requested world block its bootstrap
    World,
}

impl std::str::FromStr for BootstrapScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "world" => Ok(Self::World),
            other => Err(format!(
                "Invalid bootstrap scope: {other}. Must be one of: [\"global\", \"world\"]"
            )),
        }
    }
}

impl std::fmt::Display for BootstrapScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapScope::Global => write!(f, "global"),
            BootstrapScope::World => write!(f, "world"),
        }
    }
}

/// Failure of a membership check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The user has no membership and the store is already configured
    #[error("Forbidden")]
    AccessDenied,

    /// Lookup, count or create failed in the store
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GateError {
    /// HTTP-style status the caller should surface.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::AccessDenied => 403,
            GateError::Store(_) => 500,
        }
    }

    /// Response body for the caller. A denial carries no body and store
    /// failures are reported generically.
    pub fn body(&self) -> Option<String> {
        match self {
            GateError::AccessDenied => None,
            GateError::Store(_) => Some("Internal Server Error".to_string()),
        }
    }
}

/// Grants, denies or bootstraps access to worlds.
#[derive(Debug, Clone)]
pub struct MembershipGate {
    store: Arc<dyn MembershipStore>,
    scope: BootstrapScope,
}

impl MembershipGate {
    /// Creates a gate with the default global bootstrap scope.
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self::with_scope(store, BootstrapScope::default())
    }

    pub fn with_scope(store: Arc<dyn MembershipStore>, scope: BootstrapScope) -> Self {
        Self { store, scope }
    }

    pub fn scope(&self) -> BootstrapScope {
        self.scope
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// Returns the user's membership of `world`, creating a GM membership if
    /// and only if the store is unconfigured.
    pub async fn require_membership(
        &self,
        user: &User,
        world: &World,
    ) -> Result<Membership, GateError> {
        if let Some(membership) = self.store.find_unique(world.id, &user.discord_id).await? {
            debug!("🔓 {} already holds {} in world {}", user.discord_id, membership.role, world.id);
            return Ok(membership);
        }

        let scope = match self.scope {
            BootstrapScope::Global => CountScope::All,
            BootstrapScope::World => CountScope::World(world.id),
        };
        if self.store.count(scope, 1).await? >= 1 {
            warn!("⛔ Denied {} access to configured world {}", user.discord_id, world.id);
            return Err(GateError::AccessDenied);
        }

        let membership = self
            .store
            .create(world.id, &user.discord_id, Role::Gm)
            .await?;
        info!("👑 {} bootstrapped world '{}' as GM", user.name, world.name);
        Ok(membership)
    }
}
