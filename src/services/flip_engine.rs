//! Pure flip transitions.
//!
//! [`apply_flip`] never performs I/O: it returns the next game state together
//! with the side effects the caller must carry out. The commit effect
//! (persist or delete) always comes first so an executor can stop before any
//! notification or grant when the store write fails.

use crate::{
    error::MoveRejection,
    models::{Game, PushEvent},
    services::achievement_policy::{completion_achievement, streak_achievement},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First card of the turn; nothing resolved yet.
    Pending,
    Match,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PersistGame,
    DeleteGame,
    Notify { user_id: String, event: PushEvent },
    GrantAchievement { name: &'static str, user_id: String },
    RecordWin { user_id: String },
}

#[derive(Debug, Clone)]
pub struct FlipOutcome {
    pub game: Game,
    pub value: String,
    pub resolution: Resolution,
    pub winner: Option<String>,
    pub effects: Vec<Effect>,
}

impl FlipOutcome {
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }
}

pub fn validate_flip(game: &Game, actor: &str, index: usize) -> Result<(), MoveRejection> {
    match game.card_flipped.get(index) {
        None => return Err(MoveRejection::OutOfRange),
        Some(true) => return Err(MoveRejection::AlreadyFlipped),
        Some(false) => {}
    }
    if game.current_player != actor {
        return Err(MoveRejection::WrongTurn);
    }
    Ok(())
}

/// Strictly higher score wins; a tie goes to whoever holds the turn.
pub fn winner_of(game: &Game) -> &str {
    if game.score_of(&game.current_player) < game.score_of(&game.other_player) {
        &game.other_player
    } else {
        &game.current_player
    }
}

pub fn apply_flip(game: &Game, actor: &str, index: usize) -> Result<FlipOutcome, MoveRejection> {
    validate_flip(game, actor, index)?;

    let mut next = game.clone();
    let opponent = next.other_player.clone();
    next.card_flipped[index] = true;
    let value = next.card_values[index].clone();

    let resolution = match next.last_flipped.take() {
        None => {
            next.last_flipped = Some(index);
            Resolution::Pending
        }
        Some(pending) if next.card_values[pending] == value => {
            *next.scores.entry(actor.to_string()).or_insert(0) += 1;
            next.streak += 1;
            Resolution::Match
        }
        Some(pending) => {
            next.card_flipped[pending] = false;
            next.card_flipped[index] = false;
            std::mem::swap(&mut next.current_player, &mut next.other_player);
            next.streak = 0;
            Resolution::Mismatch
        }
    };

    let mut follow_ups = Vec::new();
    follow_ups.push(Effect::Notify {
        user_id: opponent,
        event: PushEvent::CardRevealed {
            index,
            value: value.clone(),
            game_id: next.id.clone(),
        },
    });

    if resolution == Resolution::Match {
        if let Some(name) = streak_achievement(next.streak) {
            follow_ups.push(Effect::GrantAchievement {
                name,
                user_id: next.current_player.clone(),
            });
        }
    }

    let (commit, winner) = if next.is_finished() {
        let winner = winner_of(&next).to_string();
        follow_ups.push(Effect::RecordWin {
            user_id: winner.clone(),
        });
        for player in [&next.current_player, &next.other_player] {
            follow_ups.push(Effect::GrantAchievement {
                name: completion_achievement(),
                user_id: player.clone(),
            });
        }
        (Effect::DeleteGame, Some(winner))
    } else {
        (Effect::PersistGame, None)
    };

    let mut effects = Vec::with_capacity(follow_ups.len() + 1);
    effects.push(commit);
    effects.extend(follow_ups);

    Ok(FlipOutcome {
        game: next,
        value,
        resolution,
        winner,
        effects,
    })
}
