//! The user as seen by a page: who they are and what the gate decided.

use crate::gate::GateError;
use crate::types::{DiscordId, Membership, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub discord_id: DiscordId,
    pub name: String,
    /// The gate granted a membership
    pub is_allowed: bool,
    /// The membership is a GM membership
    pub is_admin: bool,
}

impl SessionUser {
    pub fn from_gate(user: &User, outcome: &Result<Membership, GateError>) -> Self {
        let membership = outcome.as_ref().ok();
        Self {
            discord_id: user.discord_id.clone(),
            name: user.name.clone(),
            is_allowed: membership.is_some(),
            is_admin: membership.is_some_and(|m| m.role.is_gm()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, WorldId};

    #[test]
    fn flags_follow_the_gate_outcome() {
        let user = User::new("1", "Ash");
        let membership = Membership {
            world_id: WorldId::new(),
            user_discord_id: user.discord_id.clone(),
            role: Role::Player,
            created_at: 0,
        };

        let player = SessionUser::from_gate(&user, &Ok(membership.clone()));
        assert!(player.is_allowed && !player.is_admin);

        let gm = SessionUser::from_gate(&user, &Ok(Membership { role: Role::Gm, ..membership }));
        assert!(gm.is_allowed && gm.is_admin);

        let denied = SessionUser::from_gate(&user, &Err(GateError::AccessDenied));
        assert!(!denied.is_allowed && !denied.is_admin);
    }
}
