//! Dice rolling and the per-room dice log.
//!
//! Rolls are always six-sided. Each roll is logged against the room so late
//! joiners can see the recent history.

use crate::types::{current_timestamp, DiscordId, WorldId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DIE_SIDES: u32 = 6;
pub const MAX_INTENT_LENGTH: usize = 100;
/// Number of log entries handed to a client when it joins.
pub const RECENT_LOG_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    #[error("count must be a positive integer")]
    InvalidCount,

    #[error("cannot roll more than {max} dice at once")]
    TooManyDice { max: u32 },

    #[error("intent must be at most {MAX_INTENT_LENGTH} characters")]
    IntentTooLong,

    #[error("malformed roll request: {0}")]
    Malformed(String),
}

/// A single rolled die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Die {
    pub sides: u32,
    pub result: u32,
}

/// A validated roll request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollRequest {
    pub count: u32,
    pub intent: String,
}

impl RollRequest {
    pub fn new(count: u32, intent: impl Into<String>, max_dice: u32) -> Result<Self, DiceError> {
        let intent = intent.into();
        if count == 0 {
            return Err(DiceError::InvalidCount);
        }
        if count > max_dice {
            return Err(DiceError::TooManyDice { max: max_dice });
        }
        // Measured in UTF-16 code units, like the browser form.
        if intent.encode_utf16().count() > MAX_INTENT_LENGTH {
            return Err(DiceError::IntentTooLong);
        }
        Ok(Self { count, intent })
    }

    /// Parses `{ "count": ..., "intent": ... }`. `count` may be a number or a
    /// numeric string, as submitted by the dice form. Integral floats such as
    /// `3.0` are accepted.
    pub fn from_value(data: &Value, max_dice: u32) -> Result<Self, DiceError> {
        let count = match data.get("count") {
            Some(Value::Number(n)) => match n.as_u64() {
                Some(count) => count,
                None => n.as_f64().and_then(integral).ok_or(DiceError::InvalidCount)?,
            },
            Some(Value::String(s)) => {
                let s = s.trim();
                match s.parse::<u64>() {
                    Ok(count) => count,
                    Err(_) => s
                        .parse::<f64>()
                        .ok()
                        .and_then(integral)
                        .ok_or(DiceError::InvalidCount)?,
                }
            }
            Some(_) => return Err(DiceError::InvalidCount),
            None => return Err(DiceError::Malformed("missing count".to_string())),
        };
        let intent = match data.get("intent") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(_) => return Err(DiceError::Malformed("intent must be a string".to_string())),
        };
        let count = u32::try_from(count).map_err(|_| DiceError::TooManyDice { max: max_dice })?;
        Self::new(count, intent, max_dice)
    }
}

/// A non-negative whole number; larger values saturate and hit the dice cap.
fn integral(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then_some(value as u64)
}

/// Rolls `count` six-sided dice.
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R, count: u32) -> Vec<Die> {
    (0..count)
        .map(|_| Die {
            sides: DIE_SIDES,
            result: rng.gen_range(1..=DIE_SIDES),
        })
        .collect()
}

/// One logged roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceLog {
    pub id: String,
    pub room_id: WorldId,
    pub user_id: DiscordId,
    pub user_name: String,
    pub dice: Vec<Die>,
    pub intent: String,
    pub created_at: u64,
}

/// Dice logs for every room, capped per room.
#[derive(Debug)]
pub struct DiceLogBook {
    logs: Arc<RwLock<HashMap<WorldId, VecDeque<DiceLog>>>>,
    capacity: usize,
}

impl DiceLogBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            logs: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(RECENT_LOG_LIMIT),
        }
    }

    /// Rolls and records a roll for `room_id`.
    pub async fn roll(
        &self,
        room_id: WorldId,
        user_id: &DiscordId,
        user_name: &str,
        request: RollRequest,
    ) -> DiceLog {
        let dice = roll_dice(&mut rand::thread_rng(), request.count);
        let entry = DiceLog {
            id: Uuid::new_v4().to_string(),
            room_id,
            user_id: user_id.clone(),
            user_name: user_name.to_string(),
            dice,
            intent: request.intent,
            created_at: current_timestamp(),
        };
        self.push(entry.clone()).await;
        entry
    }

    pub async fn push(&self, entry: DiceLog) {
        let mut logs = self.logs.write().await;
        let room = logs.entry(entry.room_id).or_default();
        room.push_back(entry);
        while room.len() > self.capacity {
            room.pop_front();
        }
    }

    /// The newest `limit` entries for a room, oldest first.
    pub async fn recent(&self, room_id: WorldId, limit: usize) -> Vec<DiceLog> {
        let logs = self.logs.read().await;
        logs.get(&room_id)
            .map(|room| {
                let skip = room.len().saturating_sub(limit);
                room.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Every entry of every room, for snapshots.
    pub async fn all(&self) -> Vec<DiceLog> {
        let logs = self.logs.read().await;
        let mut entries: Vec<DiceLog> = logs.values().flat_map(|room| room.iter().cloned()).collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[test]
    fn rolled_dice_are_six_sided() {
        let mut rng = StdRng::seed_from_u64(7);
        let dice = roll_dice(&mut rng, 50);
        assert_eq!(dice.len(), 50);
        assert!(dice.iter().all(|d| d.sides == 6 && (1..=6).contains(&d.result)));
    }

    #[test]
    fn roll_requests_are_validated() {
        assert_eq!(
            RollRequest::from_value(&json!({"count": "3", "intent": "Kael: Notice"}), 20),
            Ok(RollRequest { count: 3, intent: "Kael: Notice".to_string() })
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": 0}), 20),
            Err(DiceError::InvalidCount)
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": -2}), 20),
            Err(DiceError::InvalidCount)
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": "two"}), 20),
            Err(DiceError::InvalidCount)
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": 21}), 20),
            Err(DiceError::TooManyDice { max: 20 })
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": 1, "intent": "x".repeat(101)}), 20),
            Err(DiceError::IntentTooLong)
        );
        assert!(RollRequest::from_value(&json!({"count": 1, "intent": "x".repeat(100)}), 20).is_ok());
    }

    #[test]
    fn integral_floats_count_as_whole_dice() {
        assert_eq!(RollRequest::from_value(&json!({"count": 3.0}), 20).map(|r| r.count), Ok(3));
        assert_eq!(RollRequest::from_value(&json!({"count": "2.0"}), 20).map(|r| r.count), Ok(2));
        assert_eq!(
            RollRequest::from_value(&json!({"count": 2.5}), 20),
            Err(DiceError::InvalidCount)
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": -3.0}), 20),
            Err(DiceError::InvalidCount)
        );
        assert_eq!(
            RollRequest::from_value(&json!({"count": 1e12}), 20),
            Err(DiceError::TooManyDice { max: 20 })
        );
    }

    #[test]
    fn intent_length_counts_utf16_units() {
        // Each of these emoji is two UTF-16 units.
        let fifty = "🎲".repeat(50);
        assert!(RollRequest::new(1, fifty.clone(), 20).is_ok());
        assert_eq!(
            RollRequest::new(1, format!("{fifty}!"), 20),
            Err(DiceError::IntentTooLong)
        );
        assert_eq!(
            RollRequest::new(1, "🎲".repeat(51), 20),
            Err(DiceError::IntentTooLong)
        );
    }

    #[tokio::test]
    async fn recent_returns_the_newest_entries_oldest_first() {
        let book = DiceLogBook::new(25);
        let room = WorldId::new();
        let user = DiscordId::new("u");

        for i in 0..30 {
            let request = RollRequest::new(1, format!("roll {i}"), 10).unwrap();
            book.roll(room, &user, "U", request).await;
        }

        let recent = book.recent(room, RECENT_LOG_LIMIT).await;
        assert_eq!(recent.len(), 20);
        assert_eq!(recent.first().unwrap().intent, "roll 10");
        assert_eq!(recent.last().unwrap().intent, "roll 29");
        assert_eq!(book.all().await.len(), 25);
        assert!(book.recent(WorldId::new(), 20).await.is_empty());
    }
}
