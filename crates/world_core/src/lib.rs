//! # World Core
//!
//! Domain model for Charge Worlds, a shared campaign space for the Charge RPG:
//! a world sheet, character sheets, progress clocks, dice rolls and live
//! cursors for a game master and a handful of players.
//!
//! ## Components
//!
//! - [`gate`] - The membership gate run before any world data is served
//! - [`store`] - The [`MembershipStore`] trait and its in-memory implementation
//! - [`room`] - Per-world room storage and the registry of rooms
//! - [`clocks`], [`characters`] - The records kept in room storage
//! - [`presence`] - Live cursors
//! - [`dice`] - Dice rolling and the dice log
//! - [`session`] - What a connected user is allowed to do
//! - [`snapshot`] - JSON persistence of all of the above
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use world_core::{MembershipGate, MemoryMembershipStore, Role, User, World};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gate = MembershipGate::new(Arc::new(MemoryMembershipStore::new()));
//! let world = World::new("Ashfall", "A city under cinders");
//!
//! // The first user of an unconfigured deployment becomes its GM.
//! let membership = gate.require_membership(&User::new("1001", "Ash"), &world).await?;
//! assert_eq!(membership.role, Role::Gm);
//!
//! // Everyone else is turned away until the GM grants them a membership.
//! let denied = gate.require_membership(&User::new("1002", "Rue"), &world).await;
//! assert_eq!(denied.unwrap_err().status_code(), 403);
//! # Ok(())
//! # }
//! ```

pub mod characters;
pub mod clocks;
pub mod dice;
pub mod gate;
pub mod presence;
pub mod room;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod types;

pub use characters::{Character, CharacterUpdate};
pub use clocks::{ClockState, ClockUpdate};
pub use dice::{DiceError, DiceLog, DiceLogBook, Die, RollRequest};
pub use gate::{BootstrapScope, GateError, MembershipGate};
pub use presence::{Cursor, Presence, PresenceKey};
pub use room::{Room, RoomError, RoomRegistry, RoomStorage, WorldInfo, WorldUpdate};
pub use session::SessionUser;
pub use snapshot::{RestoredState, Snapshot, SnapshotError};
pub use store::{CountScope, MembershipStore, MemoryMembershipStore, StoreError};
pub use types::{current_timestamp, DiscordId, Membership, Role, User, World, WorldId};
