//! Character sheets.
//!
//! Sheets are stored in the room and edited field by field with partial
//! updates. Numeric tracks are clamped to the sheet's printed limits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Segments on the stress clock.
pub const MAX_STRESS: u32 = 4;
/// Dots on each action.
pub const MAX_ACTION_LEVEL: u32 = 4;

pub const DEFAULT_COLOR: &str = "gray";

/// Sheet colors offered by the color picker.
pub const CHARACTER_COLORS: &[&str] = &[
    "gray", "red", "orange", "yellow", "green", "teal", "blue", "purple", "pink",
];

/// Actions printed on every sheet, grouped by category.
pub const ACTION_LIBRARY: &[(&str, &[&str])] = &[
    ("Physical", &["Brawl", "Maneuver", "Endure", "Craft"]),
    ("Mental", &["Study", "Notice", "Tinker", "Channel"]),
    ("Social", &["Persuade", "Deceive", "Intimidate", "Empathize"]),
];

/// Whether `action` appears in the action library.
pub fn is_known_action(action: &str) -> bool {
    ACTION_LIBRARY
        .iter()
        .any(|(_, actions)| actions.contains(&action))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLevel {
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub group: String,
    pub momentum: u32,
    pub stress: u32,
    pub condition: String,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionLevel>,
    pub concept: String,
    pub appearance: String,
    pub ties: String,
    pub talents: String,
    pub color: String,
    #[serde(default)]
    pub hidden: bool,
}

impl Character {
    /// A blank sheet with a random id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            group: String::new(),
            momentum: 2,
            stress: 0,
            condition: String::new(),
            actions: BTreeMap::new(),
            concept: String::new(),
            appearance: String::new(),
            ties: String::new(),
            talents: String::new(),
            color: DEFAULT_COLOR.to_string(),
            hidden: false,
        }
    }

    /// Current level of `action`, zero when never trained.
    pub fn action_level(&self, action: &str) -> u32 {
        self.actions.get(action).map_or(0, |a| a.level)
    }

    /// Dice pool and intent for rolling `action`.
    pub fn action_roll(&self, action: &str) -> (u32, String) {
        (self.action_level(action) + 1, format!("{}: {}", self.name, action))
    }

    /// Display name, falling back to "Unnamed" for blank sheets.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unnamed"
        } else {
            &self.name
        }
    }

    /// Merges a partial update into the sheet. `hidden` is applied too; the
    /// caller decides who may change it.
    pub fn apply(&mut self, update: CharacterUpdate) {
        let CharacterUpdate {
            name,
            group,
            momentum,
            stress,
            condition,
            actions,
            concept,
            appearance,
            ties,
            talents,
            color,
            hidden,
        } = update;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(group) = group {
            self.group = group;
        }
        if let Some(momentum) = momentum {
            self.momentum = momentum;
        }
        if let Some(stress) = stress {
            self.stress = stress;
        }
        if let Some(condition) = condition {
            self.condition = condition;
        }
        if let Some(actions) = actions {
            self.actions = actions;
        }
        if let Some(concept) = concept {
            self.concept = concept;
        }
        if let Some(appearance) = appearance {
            self.appearance = appearance;
        }
        if let Some(ties) = ties {
            self.ties = ties;
        }
        if let Some(talents) = talents {
            self.talents = talents;
        }
        if let Some(color) = color {
            if CHARACTER_COLORS.contains(&color.as_str()) {
                self.color = color;
            }
        }
        if let Some(hidden) = hidden {
            self.hidden = hidden;
        }
        self.normalize();
    }

    pub(crate) fn normalize(&mut self) {
        self.stress = self.stress.min(MAX_STRESS);
        for action in self.actions.values_mut() {
            action.level = action.level.min(MAX_ACTION_LEVEL);
        }
        if !CHARACTER_COLORS.contains(&self.color.as_str()) {
            self.color = DEFAULT_COLOR.to_string();
        }
    }
}

impl Default for Character {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial character update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterUpdate {
    pub name: Option<String>,
    pub group: Option<String>,
    pub momentum: Option<u32>,
    pub stress: Option<u32>,
    pub condition: Option<String>,
    pub actions: Option<BTreeMap<String, ActionLevel>>,
    pub concept: Option<String>,
    pub appearance: Option<String>,
    pub ties: Option<String>,
    pub talents: Option<String>,
    pub color: Option<String>,
    pub hidden: Option<bool>,
}

impl CharacterUpdate {
    pub fn touches_visibility(&self) -> bool {
        self.hidden.is_some()
    }
}

/// Characters visible to a viewer; hidden sheets are for GMs only.
pub fn visible_characters(characters: &[Character], is_admin: bool) -> Vec<Character> {
    characters
        .iter()
        .filter(|c| is_admin || !c.hidden)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_merge_and_clamp() {
        let mut character = Character::new();
        let mut actions = BTreeMap::new();
        actions.insert("Brawl".to_string(), ActionLevel { level: 7 });

        character.apply(CharacterUpdate {
            name: Some("Kael".to_string()),
            stress: Some(10),
            actions: Some(actions),
            color: Some("chartreuse".to_string()),
            ..Default::default()
        });

        assert_eq!(character.name, "Kael");
        assert_eq!(character.stress, MAX_STRESS);
        assert_eq!(character.action_level("Brawl"), MAX_ACTION_LEVEL);
        assert_eq!(character.color, DEFAULT_COLOR);
        assert_eq!(character.group, "");
    }

    #[test]
    fn action_roll_uses_level_plus_one() {
        let mut character = Character::new();
        character.name = "Kael".to_string();
        character
            .actions
            .insert("Notice".to_string(), ActionLevel { level: 2 });

        assert_eq!(character.action_roll("Notice"), (3, "Kael: Notice".to_string()));
        assert_eq!(character.action_roll("Brawl").0, 1);
    }

    #[test]
    fn hidden_sheets_are_filtered_for_players() {
        let visible = Character::new();
        let mut hidden = Character::new();
        hidden.hidden = true;
        let sheets = vec![visible.clone(), hidden];

        assert_eq!(visible_characters(&sheets, false), vec![visible]);
        assert_eq!(visible_characters(&sheets, true).len(), 2);
    }

    #[test]
    fn library_lookup() {
        assert!(is_known_action("Persuade"));
        assert!(!is_known_action("Teleport"));
        assert_eq!(Character::new().display_name(), "Unnamed");
    }
}
