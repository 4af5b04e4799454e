use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    db::Database,
    error::{AppError, MoveRejection, Result},
    integrations::{AchievementGranter, ChatDirectory},
    models::{FlipCardResponse, Game, GameView, StartGameResponse},
    services::{
        achievement_policy::win_achievements,
        deck,
        flip_engine::{apply_flip, Effect, FlipOutcome},
        notification_service::NotificationService,
    },
};

const UNKNOWN_OPPONENT: &str = "unknown";

/// One async mutex per game id so load, transition and commit never interleave.
#[derive(Clone, Default)]
struct GameLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl GameLocks {
    async fn acquire(&self, game_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // entries nobody holds or waits on are only referenced by the map
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(game_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Session orchestration: start, view, nudge and flip.
///
/// Holds the injected collaborators; the flip rules themselves live in
/// [`crate::services::flip_engine`] and never touch I/O.
#[derive(Clone)]
pub struct GameService {
    db: Database,
    notifications: NotificationService,
    chat: Arc<dyn ChatDirectory>,
    achievements: AchievementGranter,
    locks: GameLocks,
}

impl GameService {
    pub fn new(
        db: Database,
        notifications: NotificationService,
        chat: Arc<dyn ChatDirectory>,
        achievements: AchievementGranter,
    ) -> Self {
        Self {
            db,
            notifications,
            chat,
            achievements,
            locks: GameLocks::default(),
        }
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Starts (or restarts) the game bound to a direct-message channel.
    pub async fn start_game(&self, initiator: &str, channel_id: &str) -> Result<StartGameResponse> {
        let channel = self.chat.get_channel(channel_id).await.map_err(|err| match err {
            AppError::NotFound(_) => AppError::InvalidContext("Channel not found".to_string()),
            other => other,
        })?;
        if !channel.is_direct() {
            tracing::debug!("Refusing to start a game in non-direct channel {}", channel_id);
            return Err(AppError::InvalidContext(
                "Games can only be started in a direct message".to_string(),
            ));
        }
        let opponent = channel
            .other_member_for_dm(initiator)
            .ok_or_else(|| AppError::InvalidContext("Not a member of this channel".to_string()))?
            .to_string();
        if opponent == initiator {
            return Err(AppError::InvalidContext(
                "A game needs two different players".to_string(),
            ));
        }

        let game = deck::new_game(&channel.id, initiator, &opponent);
        {
            let _guard = self.locks.acquire(&game.id).await;
            self.db.set_game(&game).await?;
        }
        tracing::info!(
            "Game {} started by {} against {} (first mover {})",
            game.id,
            initiator,
            opponent,
            game.current_player
        );

        match self.chat.get_user(initiator).await {
            Ok(user) => {
                let message = format!("@{} started a memory game with you.", user.username);
                if let Err(err) = self.chat.send_direct_message(&opponent, &message).await {
                    tracing::warn!("Start notice to {} failed: {}", opponent, err);
                }
            }
            Err(err) => tracing::warn!("Cannot look up initiator {}: {}", initiator, err),
        }

        Ok(StartGameResponse {
            turn: game.current_player == initiator,
            game_id: game.id,
        })
    }

    pub async fn get_view(&self, game_id: &str, requester: &str) -> Result<GameView> {
        let game = self.db.get_game(game_id).await?;
        if !game.is_participant(requester) {
            return Err(AppError::Forbidden(
                "Not a participant of this game".to_string(),
            ));
        }

        let opponent_name = match self.chat.get_user(game.opponent_of(requester)).await {
            Ok(user) => user.username,
            Err(err) => {
                tracing::debug!("Opponent lookup failed for game {}: {}", game_id, err);
                UNKNOWN_OPPONENT.to_string()
            }
        };
        Ok(game.view_for(requester, opponent_name))
    }

    /// Reminds the mover that the requester is waiting.
    pub async fn nudge(&self, game_id: &str, requester: &str) -> Result<()> {
        let game = self.db.get_game(game_id).await?;
        if game.other_player != requester {
            tracing::debug!("Nudge from {} rejected in game {}", requester, game_id);
            self.resync(requester, &game).await;
            return Err(AppError::InvalidMove(MoveRejection::WrongPlayer));
        }

        let user = self.chat.get_user(requester).await.map_err(|err| {
            AppError::DownstreamFailure(format!("Cannot look up {}: {}", requester, err))
        })?;
        let message = format!("@{} is waiting for you to move.", user.username);
        if let Err(err) = self
            .chat
            .send_direct_message(&game.current_player, &message)
            .await
        {
            tracing::warn!("Nudge to {} failed: {}", game.current_player, err);
        }
        Ok(())
    }

    pub async fn flip(&self, game_id: &str, actor: &str, index: i64) -> Result<FlipCardResponse> {
        let _guard = self.locks.acquire(game_id).await;
        let game = self.db.get_game(game_id).await?;

        let transition = usize::try_from(index)
            .map_err(|_| MoveRejection::OutOfRange)
            .and_then(|index| apply_flip(&game, actor, index));
        let outcome = match transition {
            Ok(outcome) => outcome,
            Err(rejection) => {
                tracing::debug!(
                    "Flip rejected game={} player={} index={}: {}",
                    game_id,
                    actor,
                    index,
                    rejection
                );
                self.resync(actor, &game).await;
                return Err(AppError::InvalidMove(rejection));
            }
        };

        if let Err(err) = self.execute(&outcome).await {
            tracing::warn!("Cannot commit flip in game {}: {}", game_id, err);
            // the write failed, so the stored (pre-flip) state is what the client must see
            self.resync(actor, &game).await;
            return Err(err);
        }

        if outcome.is_finished() {
            log_finished(&outcome);
        }
        Ok(FlipCardResponse {
            value: outcome.value,
        })
    }

    // Internal helper that runs side-effecting logic for `execute`.
    async fn execute(&self, outcome: &FlipOutcome) -> Result<()> {
        for effect in &outcome.effects {
            match effect {
                Effect::PersistGame => self.db.set_game(&outcome.game).await?,
                Effect::DeleteGame => self.db.remove_game(&outcome.game.id).await?,
                Effect::Notify { user_id, event } => {
                    self.notifications.publish(user_id, event.clone()).await
                }
                Effect::GrantAchievement { name, user_id } => {
                    self.achievements.grant(name, user_id).await
                }
                Effect::RecordWin { user_id } => self.record_win(user_id).await,
            }
        }
        Ok(())
    }

    // Internal helper that runs side-effecting logic for `record_win`.
    async fn record_win(&self, user_id: &str) {
        let mut stats = match self.db.get_player_stats(user_id).await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!("Cannot load stats for {}: {}", user_id, err);
                return;
            }
        };
        stats.wins += 1;
        if let Err(err) = self.db.set_player_stats(user_id, &stats).await {
            tracing::warn!("Cannot save stats for {}: {}", user_id, err);
        }
        for name in win_achievements(stats.wins) {
            self.achievements.grant(name, user_id).await;
        }
    }

    /// Full-state push to a caller whose view may be stale; strangers get nothing.
    async fn resync(&self, user_id: &str, game: &Game) {
        if game.is_participant(user_id) {
            self.notifications
                .publish(user_id, game.resync_for(user_id))
                .await;
        }
    }
}

// Internal helper that supports `log_finished` operations.
fn log_finished(outcome: &FlipOutcome) {
    let game = &outcome.game;
    let elapsed = chrono::Utc::now().timestamp() - game.started_at;
    tracing::info!(
        "Game {} finished: winner={} score {}:{} after {}s",
        game.id,
        outcome.winner.as_deref().unwrap_or_default(),
        game.score_of(&game.current_player),
        game.score_of(&game.other_player),
        elapsed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ACHIEVEMENT_PLAY_ONCE, ACHIEVEMENT_STREAK, ACHIEVEMENT_WIN_ONE};
    use crate::db::{tests::FlakyStore, KvStore, MemoryStore};
    use crate::integrations::testing::{FakeChat, RecordingAchievements};
    use crate::models::{game::sample_game, PlayerStats, PushEvent};
    use crate::services::achievement_policy::CATALOG;

    struct Harness {
        service: GameService,
        chat: Arc<FakeChat>,
        badges: Arc<RecordingAchievements>,
    }

    fn chat() -> FakeChat {
        FakeChat::default()
            .with_user("p1", "alice")
            .with_user("p2", "bob")
            .with_channel("dm_1", "D", "p1__p2")
            .with_channel("town", "O", "town-square")
    }

    async fn harness_with(store: Arc<dyn KvStore>) -> Harness {
        let chat = Arc::new(chat());
        let badges = Arc::new(RecordingAchievements::default());
        let achievements = AchievementGranter::bootstrap(badges.clone(), &CATALOG).await;
        let service = GameService::new(
            Database::with_store(store),
            NotificationService::new(),
            chat.clone(),
            achievements,
        );
        Harness {
            service,
            chat,
            badges,
        }
    }

    async fn harness() -> Harness {
        harness_with(Arc::new(MemoryStore::new())).await
    }

    async fn seeded(values: &[&str]) -> Harness {
        let h = harness().await;
        h.service.db().set_game(&sample_game(values)).await.unwrap();
        h
    }

    fn granted(name: &str, user: &str) -> (String, String) {
        (name.to_string(), user.to_string())
    }

    #[tokio::test]
    async fn start_game_in_direct_channel() {
        let h = harness().await;
        let response = h.service.start_game("p1", "dm_1").await.unwrap();

        assert_eq!(response.game_id, "dm_1");
        let game = h.service.db().get_game("dm_1").await.unwrap();
        assert_eq!(response.turn, game.current_player == "p1");
        assert!(game.is_participant("p1") && game.is_participant("p2"));
        assert_eq!(
            h.chat.sent().await,
            vec![(
                "p2".to_string(),
                "@alice started a memory game with you.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn start_game_rejects_invalid_contexts() {
        let h = harness().await;
        for (user, channel) in [("p1", "town"), ("p3", "dm_1"), ("p1", "missing")] {
            let err = h.service.start_game(user, channel).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidContext(_)), "{} in {}", user, channel);
        }
    }

    #[tokio::test]
    async fn start_game_rejects_self_direct_message() {
        let chat = FakeChat::default()
            .with_user("p1", "alice")
            .with_channel("self", "D", "p1__p1");
        let service = GameService::new(
            Database::with_store(Arc::new(MemoryStore::new())),
            NotificationService::new(),
            Arc::new(chat),
            AchievementGranter::disabled(),
        );
        assert!(matches!(
            service.start_game("p1", "self").await,
            Err(AppError::InvalidContext(_))
        ));
    }

    #[tokio::test]
    async fn full_game_awards_win_and_removes_record() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        let mut opponent = h.service.notifications().register_connection("p2").await;

        for (index, expected) in [(0, "A"), (2, "A"), (1, "B"), (3, "B")] {
            let response = h.service.flip("channel_1", "p1", index).await.unwrap();
            assert_eq!(response.value, expected);
        }

        assert!(matches!(
            h.service.db().get_game("channel_1").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            h.service.db().get_player_stats("p1").await.unwrap(),
            PlayerStats { wins: 1 }
        );
        assert_eq!(h.service.db().get_player_stats("p2").await.unwrap().wins, 0);

        let grants = h.badges.granted().await;
        assert!(grants.contains(&granted(ACHIEVEMENT_WIN_ONE, "p1")));
        assert!(grants.contains(&granted(ACHIEVEMENT_PLAY_ONCE, "p1")));
        assert!(grants.contains(&granted(ACHIEVEMENT_PLAY_ONCE, "p2")));
        assert!(!grants.iter().any(|(name, _)| name == ACHIEVEMENT_STREAK));

        let mut revealed = Vec::new();
        while let Ok(event) = opponent.try_recv() {
            if let PushEvent::CardRevealed { index, .. } = event {
                revealed.push(index);
            }
        }
        assert_eq!(revealed, vec![0, 2, 1, 3]);

        assert!(matches!(
            h.service.flip("channel_1", "p1", 0).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mismatch_passes_turn_in_store() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        h.service.flip("channel_1", "p1", 0).await.unwrap();
        let response = h.service.flip("channel_1", "p1", 1).await.unwrap();
        assert_eq!(response.value, "B");

        let game = h.service.db().get_game("channel_1").await.unwrap();
        assert_eq!(game.current_player, "p2");
        assert_eq!(game.streak, 0);
        assert!(game.card_flipped.iter().all(|flipped| !flipped));
    }

    #[tokio::test]
    async fn wrong_turn_resyncs_caller_without_mutation() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        let mut caller = h.service.notifications().register_connection("p2").await;
        let before = h.service.db().get_game("channel_1").await.unwrap();

        let err = h.service.flip("channel_1", "p2", 0).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidMove(MoveRejection::WrongTurn)));
        assert_eq!(h.service.db().get_game("channel_1").await.unwrap(), before);
        assert_eq!(caller.try_recv().unwrap(), before.resync_for("p2"));
    }

    #[tokio::test]
    async fn already_flipped_resyncs_caller() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        h.service.flip("channel_1", "p1", 0).await.unwrap();
        let mut caller = h.service.notifications().register_connection("p1").await;

        let err = h.service.flip("channel_1", "p1", 0).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidMove(MoveRejection::AlreadyFlipped)
        ));
        match caller.try_recv().unwrap() {
            PushEvent::Resync { last_flipped, turn, .. } => {
                assert_eq!(last_flipped, 0);
                assert!(turn);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn negative_index_is_out_of_range_with_resync() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        let mut caller = h.service.notifications().register_connection("p1").await;
        let before = h.service.db().get_game("channel_1").await.unwrap();

        let err = h.service.flip("channel_1", "p1", -1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidMove(MoveRejection::OutOfRange)));
        assert_eq!(caller.try_recv().unwrap(), before.resync_for("p1"));
        assert_eq!(h.service.db().get_game("channel_1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn stranger_gets_no_game_state() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        let mut stranger = h.service.notifications().register_connection("p9").await;

        assert!(matches!(
            h.service.flip("channel_1", "p9", 0).await,
            Err(AppError::InvalidMove(MoveRejection::WrongTurn))
        ));
        assert!(matches!(
            h.service.get_view("channel_1", "p9").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(stranger.try_recv().is_err());
    }

    #[tokio::test]
    async fn storage_failure_resyncs_with_stored_state() {
        let store = Arc::new(FlakyStore::default());
        let h = harness_with(store.clone()).await;
        h.service
            .db()
            .set_game(&sample_game(&["A", "B", "A", "B"]))
            .await
            .unwrap();
        let before = h.service.db().get_game("channel_1").await.unwrap();
        let mut caller = h.service.notifications().register_connection("p1").await;
        let mut opponent = h.service.notifications().register_connection("p2").await;

        store.set_failing(true);
        let err = h.service.flip("channel_1", "p1", 0).await.unwrap_err();
        assert!(err.is_storage());

        assert_eq!(caller.try_recv().unwrap(), before.resync_for("p1"));
        assert!(opponent.try_recv().is_err());
        assert_eq!(h.service.db().get_game("channel_1").await.unwrap(), before);

        store.set_failing(false);
        assert_eq!(h.service.flip("channel_1", "p1", 0).await.unwrap().value, "A");
    }

    #[tokio::test]
    async fn failed_delete_on_final_flip_skips_rewards() {
        let store = Arc::new(FlakyStore::default());
        let h = harness_with(store.clone()).await;
        h.service
            .db()
            .set_game(&sample_game(&["A", "A"]))
            .await
            .unwrap();
        h.service.flip("channel_1", "p1", 0).await.unwrap();
        let before = h.service.db().get_game("channel_1").await.unwrap();
        let mut caller = h.service.notifications().register_connection("p1").await;
        let mut opponent = h.service.notifications().register_connection("p2").await;

        store.set_failing(true);
        let err = h.service.flip("channel_1", "p1", 1).await.unwrap_err();
        assert!(err.is_storage());

        assert_eq!(caller.try_recv().unwrap(), before.resync_for("p1"));
        assert!(opponent.try_recv().is_err());
        assert_eq!(h.service.db().get_game("channel_1").await.unwrap(), before);
        assert_eq!(h.service.db().get_player_stats("p1").await.unwrap().wins, 0);
        assert!(h.badges.granted().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_duplicate_flips_apply_once() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        let (first, second) = tokio::join!(
            h.service.flip("channel_1", "p1", 0),
            h.service.flip("channel_1", "p1", 0)
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        let game = h.service.db().get_game("channel_1").await.unwrap();
        assert_eq!(game.last_flipped, Some(0));
    }

    #[tokio::test]
    async fn view_is_idempotent_and_oriented() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        h.service.flip("channel_1", "p1", 2).await.unwrap();

        let first = h.service.get_view("channel_1", "p2").await.unwrap();
        let second = h.service.get_view("channel_1", "p2").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.cards, vec!["back", "back", "A", "back"]);
        assert_eq!(first.opponent_name, "alice");
        assert_eq!(first.last_flipped, 2);
        assert!(!first.turn);
    }

    #[tokio::test]
    async fn view_falls_back_to_unknown_opponent() {
        let h = harness().await;
        let mut game = sample_game(&["A", "A"]);
        game.other_player = "ghost".to_string();
        game.scores.remove("p2");
        game.scores.insert("ghost".to_string(), 0);
        h.service.db().set_game(&game).await.unwrap();

        let view = h.service.get_view("channel_1", "p1").await.unwrap();
        assert_eq!(view.opponent_name, UNKNOWN_OPPONENT);
    }

    #[tokio::test]
    async fn nudge_from_waiting_player_messages_mover() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        h.service.nudge("channel_1", "p2").await.unwrap();

        assert_eq!(
            h.chat.sent().await,
            vec![(
                "p1".to_string(),
                "@bob is waiting for you to move.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn nudge_from_mover_is_rejected_with_resync() {
        let h = seeded(&["A", "B", "A", "B"]).await;
        let mut caller = h.service.notifications().register_connection("p1").await;

        assert!(matches!(
            h.service.nudge("channel_1", "p1").await,
            Err(AppError::InvalidMove(MoveRejection::WrongPlayer))
        ));
        assert!(matches!(caller.try_recv(), Ok(PushEvent::Resync { .. })));
        assert!(h.chat.sent().await.is_empty());
    }

    #[tokio::test]
    async fn wins_accumulate_across_games() {
        let h = harness().await;
        h.service
            .db()
            .set_player_stats("p1", &PlayerStats { wins: 4 })
            .await
            .unwrap();
        h.service.db().set_game(&sample_game(&["A", "A"])).await.unwrap();

        h.service.flip("channel_1", "p1", 0).await.unwrap();
        h.service.flip("channel_1", "p1", 1).await.unwrap();

        assert_eq!(h.service.db().get_player_stats("p1").await.unwrap().wins, 5);
        let grants = h.badges.granted().await;
        assert!(grants.contains(&granted("memory-win-5", "p1")));
    }
}
