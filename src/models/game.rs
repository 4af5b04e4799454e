use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::constants::{CARD_BACK, NO_PENDING_FLIP};

// ==================== GAME ====================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub card_values: Vec<String>,
    pub card_flipped: Vec<bool>,
    pub last_flipped: Option<usize>,
    pub current_player: String,
    pub other_player: String,
    pub scores: BTreeMap<String, u32>,
    pub streak: u32,
    #[serde(default)]
    pub started_at: i64,
}

impl Game {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.current_player == user_id || self.other_player == user_id
    }

    /// The other participant from `user_id`'s point of view.
    pub fn opponent_of(&self, user_id: &str) -> &str {
        if self.current_player == user_id {
            &self.other_player
        } else {
            &self.current_player
        }
    }

    pub fn score_of(&self, user_id: &str) -> u32 {
        self.scores.get(user_id).copied().unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.card_flipped.iter().all(|flipped| *flipped)
    }

    /// Face values as the players see them: hidden cards render as the card back.
    pub fn visible_faces(&self) -> Vec<String> {
        self.card_values
            .iter()
            .zip(&self.card_flipped)
            .map(|(value, flipped)| {
                if *flipped {
                    value.clone()
                } else {
                    CARD_BACK.to_string()
                }
            })
            .collect()
    }

    pub fn pending_index_wire(&self) -> i64 {
        self.last_flipped
            .map(|index| index as i64)
            .unwrap_or(NO_PENDING_FLIP)
    }

    /// Player-scoped projection used by both the view endpoint and resync pushes.
    pub fn view_for(&self, user_id: &str, opponent_name: String) -> GameView {
        let opponent = self.opponent_of(user_id);
        GameView {
            cards: self.visible_faces(),
            turn: self.current_player == user_id,
            last_flipped: self.pending_index_wire(),
            opponent_name,
            my_score: self.score_of(user_id),
            opponent_score: self.score_of(opponent),
        }
    }

    pub fn resync_for(&self, user_id: &str) -> PushEvent {
        let opponent = self.opponent_of(user_id);
        PushEvent::Resync {
            cards: self.visible_faces(),
            turn: self.current_player == user_id,
            last_flipped: self.pending_index_wire(),
            game_id: self.id.clone(),
            my_score: self.score_of(user_id),
            opponent_score: self.score_of(opponent),
        }
    }

    /// Structural checks for a game read back from the store.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let n = self.card_values.len();
        if n == 0 || n % 2 != 0 {
            return Err(format!("deck has odd or zero length {}", n));
        }
        if self.card_flipped.len() != n {
            return Err("flip state length does not match deck".to_string());
        }
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in &self.card_values {
            *counts.entry(value.as_str()).or_default() += 1;
        }
        if counts.values().any(|count| *count != 2) {
            return Err("every face must appear exactly twice".to_string());
        }
        if self.current_player == self.other_player {
            return Err("a game needs two distinct players".to_string());
        }
        if self.scores.len() != 2
            || !self.scores.contains_key(&self.current_player)
            || !self.scores.contains_key(&self.other_player)
        {
            return Err("scores must be keyed by both players".to_string());
        }
        if let Some(pending) = self.last_flipped {
            if pending >= n || !self.card_flipped[pending] {
                return Err(format!("pending index {} is not a face-up card", pending));
            }
        }
        Ok(())
    }
}

// ==================== PLAYER STATS ====================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub wins: u32,
}

// ==================== PUSH EVENTS ====================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PushEvent {
    CardRevealed {
        index: usize,
        value: String,
        #[serde(rename = "gID")]
        game_id: String,
    },
    Resync {
        cards: Vec<String>,
        turn: bool,
        #[serde(rename = "lastFlipped")]
        last_flipped: i64,
        #[serde(rename = "gID")]
        game_id: String,
        #[serde(rename = "myScore")]
        my_score: u32,
        #[serde(rename = "opponentScore")]
        opponent_score: u32,
    },
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CardRevealed { .. } => "card_revealed",
            Self::Resync { .. } => "resync",
        }
    }
}

// ==================== REQUESTS / RESPONSES ====================
#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    #[serde(rename = "channelID")]
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartGameResponse {
    #[serde(rename = "gID")]
    pub game_id: String,
    pub turn: bool,
}

#[derive(Debug, Deserialize)]
pub struct FlipCardRequest {
    /// Signed so negative positions reach move validation instead of the extractor.
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlipCardResponse {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub cards: Vec<String>,
    pub turn: bool,
    #[serde(rename = "lastFlipped")]
    pub last_flipped: i64,
    #[serde(rename = "opponentName")]
    pub opponent_name: String,
    #[serde(rename = "myScore")]
    pub my_score: u32,
    #[serde(rename = "opponentScore")]
    pub opponent_score: u32,
}

#[derive(Debug, Serialize)]
pub struct NudgeResponse {}

#[cfg(test)]
pub(crate) fn sample_game(values: &[&str]) -> Game {
    let mut scores = BTreeMap::new();
    scores.insert("p1".to_string(), 0);
    scores.insert("p2".to_string(), 0);
    Game {
        id: "channel_1".to_string(),
        card_values: values.iter().map(|v| v.to_string()).collect(),
        card_flipped: vec![false; values.len()],
        last_flipped: None,
        current_player: "p1".to_string(),
        other_player: "p2".to_string(),
        scores,
        streak: 0,
        started_at: 0,
    }
}
