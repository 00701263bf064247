//! Live presence: who is in a room and where their cursor is.

use serde::{Deserialize, Serialize};

/// Identifies one live connection inside a room.
pub type PresenceKey = usize;

/// A user's pointer on the shared page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Page the cursor is on; clients only draw cursors for their own page
    pub route: String,
}

impl Cursor {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Per-connection presence broadcast to the rest of the room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}
