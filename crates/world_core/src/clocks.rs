//! Progress clocks.
//!
//! A clock is a named track of filled segments. The clock list lives in room
//! storage and is replaced wholesale on every change, so clients always see a
//! consistent list.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CLOCK_NAME: &str = "New Clock";
pub const DEFAULT_MAX_PROGRESS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub id: String,
    pub name: String,
    pub progress: u32,
    pub max_progress: u32,
}

impl ClockState {
    /// A fresh, empty clock with a random id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: DEFAULT_CLOCK_NAME.to_string(),
            progress: 0,
            max_progress: DEFAULT_MAX_PROGRESS,
        }
    }

    /// Applies a partial update, keeping `progress` within `0..=max_progress`.
    pub fn apply(&mut self, update: ClockUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(max_progress) = update.max_progress {
            self.max_progress = max_progress.max(1);
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        self.normalize();
    }

    pub(crate) fn normalize(&mut self) {
        self.max_progress = self.max_progress.max(1);
        self.progress = self.progress.min(self.max_progress);
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial clock update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub max_progress: Option<u32>,
}
