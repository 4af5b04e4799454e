use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::{constants::CARD_POOL, models::Game};

/// Every face of `pool` twice, shuffled.
pub fn build_deck<R: Rng + ?Sized>(pool: &[&str], rng: &mut R) -> Vec<String> {
    let mut values: Vec<String> = pool
        .iter()
        .chain(pool.iter())
        .map(|face| face.to_string())
        .collect();
    values.shuffle(rng);
    values
}

/// Fresh game for a channel with a shuffled deck and a random first mover.
pub fn new_game_with_rng<R: Rng + ?Sized>(
    game_id: &str,
    player_one: &str,
    player_two: &str,
    rng: &mut R,
) -> Game {
    let card_values = build_deck(&CARD_POOL, rng);
    let mut players = [player_one.to_string(), player_two.to_string()];
    players.shuffle(rng);
    let [current_player, other_player] = players;

    let mut scores = BTreeMap::new();
    scores.insert(player_one.to_string(), 0);
    scores.insert(player_two.to_string(), 0);

    Game {
        id: game_id.to_string(),
        card_flipped: vec![false; card_values.len()],
        card_values,
        last_flipped: None,
        current_player,
        other_player,
        scores,
        streak: 0,
        started_at: chrono::Utc::now().timestamp(),
    }
}

/// Same as [`new_game_with_rng`] using the thread-local, OS-seeded generator.
pub fn new_game(game_id: &str, player_one: &str, player_two: &str) -> Game {
    new_game_with_rng(game_id, player_one, player_two, &mut rand::rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn deck_holds_each_face_exactly_twice() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = build_deck(&CARD_POOL, &mut rng);
        assert_eq!(deck.len(), CARD_POOL.len() * 2);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for face in &deck {
            *counts.entry(face.as_str()).or_default() += 1;
        }
        assert_eq!(counts.len(), CARD_POOL.len());
        assert!(counts.values().all(|count| *count == 2));
    }

    #[test]
    fn new_game_starts_at_rest() {
        let game = new_game("dm_channel", "alice", "bob");
        assert_eq!(game.card_values.len(), 12);
        assert!(game.card_flipped.iter().all(|flipped| !flipped));
        assert_eq!(game.last_flipped, None);
        assert_eq!(game.streak, 0);
        assert_ne!(game.current_player, game.other_player);
        assert_eq!(game.score_of("alice"), 0);
        assert_eq!(game.score_of("bob"), 0);
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn both_players_can_move_first() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut alice_first = 0;
        for _ in 0..64 {
            if new_game_with_rng("g", "alice", "bob", &mut rng).current_player == "alice" {
                alice_first += 1;
            }
        }
        assert!(alice_first > 0 && alice_first < 64);
    }
}
