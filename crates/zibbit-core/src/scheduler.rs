//! The game phase loop.
//!
//! A single [`Scheduler`] per deployment alternates between `COOLDOWN` and
//! `IN_PLAY` forever:
//!
//! ```text
//! boot -> COOLDOWN --(cooldown)--> reset, IN_PLAY --(game length)--> COOLDOWN -> ...
//! ```
//!
//! Game data is reset *before* the phase flips to `IN_PLAY`, so no
//! request can write into the previous game's state. A reset that keeps
//! failing postpones the game by another cooldown instead of starting it
//! on stale data. Other store failures are logged and the loop keeps its
//! timing; a missed phase write is retried at the next transition.

use std::sync::Arc;

use tracing::{error, info, warn};
use zibbit_store::{GameStore, StoreError};
use zibbit_types::{EventKind, GamePhase};

use crate::allocator::IdAllocator;
use crate::broadcast::Broadcaster;
use crate::candidates::CandidateManager;
use crate::clock;
use crate::config::GameConfig;
use crate::phase;
use crate::story::StoryManager;

/// Reset attempts per transition before the game is postponed.
const RESET_ATTEMPTS: u32 = 3;

/// Drives phase transitions and game resets.
pub struct Scheduler {
    store: Arc<dyn GameStore>,
    config: Arc<GameConfig>,
    ids: IdAllocator,
    candidates: CandidateManager,
    story: StoryManager,
    broadcaster: Broadcaster,
}

impl Scheduler {
    /// Create a scheduler over the given components.
    pub fn new(
        store: Arc<dyn GameStore>,
        config: Arc<GameConfig>,
        ids: IdAllocator,
        candidates: CandidateManager,
        story: StoryManager,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            config,
            ids,
            candidates,
            story,
            broadcaster,
        }
    }

    /// Run the phase loop. Never returns.
    pub async fn run(self) {
        info!(
            game_length_seconds = self.config.game_length_seconds,
            game_cooldown_seconds = self.config.game_cooldown_seconds,
            "Game scheduler starting"
        );
        self.begin().await;
        loop {
            tokio::time::sleep(self.config.game_cooldown()).await;
            let playing = self.enter_in_play().await;
            if !playing.is_in_play() {
                continue;
            }
            tokio::time::sleep(self.config.game_length()).await;
            self.enter_cooldown(&playing).await;
        }
    }

    /// Boot into `COOLDOWN` with the first game one cooldown away.
    ///
    /// No event is published; nothing ended.
    pub async fn begin(&self) -> GamePhase {
        let previous = phase::load(&*self.store).await.unwrap_or_else(|e| {
            error!(error = %e, "Failed to read previous game phase");
            GamePhase::default()
        });
        let next_start = clock::after(clock::now(), self.config.game_cooldown());
        let booted = GamePhase::cooldown_after(&previous, next_start);
        self.save(&booted).await;
        info!(next_start_time = %next_start, "Waiting for the first game");
        booted
    }

    /// Reset all game data, start a game, and announce it.
    ///
    /// If the reset fails three times in a row the game does
    /// not start: the returned phase is a fresh `COOLDOWN`.
    pub async fn enter_in_play(&self) -> GamePhase {
        if !self.reset_with_retries().await {
            return self.postpone().await;
        }
        let now = clock::now();
        let end = clock::after(now, self.config.game_length());
        let playing = GamePhase::in_play(now, end);
        self.save(&playing).await;
        info!(end_time = %end, "Game started");
        self.broadcaster
            .announce(EventKind::GameStart, &playing)
            .await;
        playing
    }

    /// End the game that `previous` describes and announce the cooldown.
    pub async fn enter_cooldown(&self, previous: &GamePhase) -> GamePhase {
        let next_start = clock::after(clock::now(), self.config.game_cooldown());
        let cooling = GamePhase::cooldown_after(previous, next_start);
        self.save(&cooling).await;
        info!(next_start_time = %next_start, "Game ended");
        self.broadcaster.announce(EventKind::GameEnd, &cooling).await;
        cooling
    }

    /// Clear candidates, cooldowns, the story, and the id counters.
    ///
    /// Every step runs even if an earlier one fails; the first error is
    /// returned. Presence is left alone; connected participants stay
    /// connected.
    pub async fn reset_game(&self) -> Result<(), StoreError> {
        let candidates = self.candidates.reset().await;
        let story = self.story.reset().await;
        let ids = self.ids.reset().await;
        candidates.and(story).and(ids)
    }

    async fn reset_with_retries(&self) -> bool {
        for attempt in 1..=RESET_ATTEMPTS {
            match self.reset_game().await {
                Ok(()) => return true,
                Err(e) => warn!(attempt, error = %e, "Failed to reset game data"),
            }
        }
        false
    }

    /// Stay in `COOLDOWN` for another cooldown period.
    async fn postpone(&self) -> GamePhase {
        error!(
            attempts = RESET_ATTEMPTS,
            "Game data could not be reset; postponing the game"
        );
        let previous = phase::load(&*self.store).await.unwrap_or_else(|e| {
            error!(error = %e, "Failed to read game phase");
            GamePhase::default()
        });
        self.enter_cooldown(&previous).await
    }

    async fn save(&self, phase: &GamePhase) {
        if let Err(e) = phase::save(&*self.store, phase).await {
            error!(status = %phase.status, error = %e, "Failed to write game phase");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use std::sync::Arc;

    use zibbit_store::MemoryStore;
    use zibbit_types::{GameStatus, ParticipantId};

    use crate::config::GameConfig;
    use crate::engine::GameEngine;
    use crate::error::GameError;
    use crate::keys;
    use crate::testing::FaultyStore;

    fn short_games() -> GameConfig {
        GameConfig {
            game_length_seconds: 5,
            game_cooldown_seconds: 5,
            ..GameConfig::default()
        }
    }

    fn engine() -> GameEngine {
        GameEngine::new(Arc::new(MemoryStore::new()), short_games())
    }

    async fn status(engine: &GameEngine) -> GameStatus {
        engine.snapshot().await.unwrap().phase.status
    }

    #[tokio::test(start_paused = true)]
    async fn phases_alternate_on_schedule() {
        let engine = engine();
        let mut events = engine.subscribe();
        tokio::spawn(engine.scheduler().run());
        let a = ParticipantId::new("a");

        tokio::time::sleep(Duration::from_secs(1)).await;
        let boot = engine.snapshot().await.unwrap();
        assert_eq!(boot.phase.status, GameStatus::Cooldown);
        assert!(boot.phase.next_start_time.is_some());
        assert!(matches!(
            engine.submit_candidate(&a, "too early").await,
            Err(GameError::NotInPlay)
        ));

        // t = 6: first game running.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(status(&engine).await, GameStatus::InPlay);
        assert_eq!(events.next().await.unwrap().kind, zibbit_types::EventKind::GameStart);
        engine.submit_candidate(&a, "in time").await.unwrap();

        // t = 11: cooldown again.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let ended = engine.snapshot().await.unwrap();
        assert_eq!(ended.phase.status, GameStatus::Cooldown);
        assert!(ended.phase.start_time.is_some());
        assert!(ended.phase.next_start_time.is_some());

        // t = 16: second game starts from a clean slate.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let fresh = engine.snapshot().await.unwrap();
        assert_eq!(fresh.phase.status, GameStatus::InPlay);
        assert!(fresh.candidates.is_empty());
        assert!(fresh.story.is_empty());
        let first = engine.submit_candidate(&a, "in time").await.unwrap();
        assert_eq!(first.id.into_inner(), 1);
    }

    #[tokio::test]
    async fn reset_keeps_presence() {
        let engine = engine();
        let scheduler = engine.scheduler();
        let a = ParticipantId::new("a");
        engine.connect(&a).await.unwrap();

        scheduler.enter_in_play().await;
        engine.submit_candidate(&a, "one two").await.unwrap();
        scheduler.enter_in_play().await;

        let snapshot = engine.snapshot().await.unwrap();
        assert!(snapshot.candidates.is_empty());
        assert_eq!(snapshot.connected_users, vec![a]);
    }

    #[tokio::test]
    async fn failed_reset_postpones_the_game() {
        let faulty = Arc::new(FaultyStore::default());
        let engine = GameEngine::new(faulty.clone(), short_games());
        let scheduler = engine.scheduler();
        let a = ParticipantId::new("a");

        let first = scheduler.enter_in_play().await;
        engine.submit_candidate(&a, "old news").await.unwrap();
        scheduler.enter_cooldown(&first).await;

        faulty.fail_on(keys::LIVE_CANDIDATES);
        let postponed = scheduler.enter_in_play().await;
        faulty.heal();
        assert_eq!(postponed.status, GameStatus::Cooldown);
        assert!(postponed.next_start_time.is_some());
        assert_eq!(status(&engine).await, GameStatus::Cooldown);

        let second = scheduler.enter_in_play().await;
        assert_eq!(second.status, GameStatus::InPlay);
        let fresh = engine.snapshot().await.unwrap();
        assert!(fresh.candidates.is_empty());
        assert_eq!(
            engine.submit_candidate(&a, "old news").await.unwrap().id.into_inner(),
            1
        );
    }
}
