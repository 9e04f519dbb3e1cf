//! [`GameEngine`], the single handle request handlers and the binary use.
//!
//! The engine is cheap to clone; every clone shares the same store and
//! configuration. There is no process-global state, so several engines
//! (each over its own store) can coexist, as the tests do.

use std::sync::Arc;

use zibbit_store::GameStore;
use zibbit_types::{Candidate, CandidateId, GameSnapshot, ParticipantId, WordId};

use crate::allocator::IdAllocator;
use crate::broadcast::{Broadcaster, EventSubscription};
use crate::candidates::{CandidateManager, VoteOutcome};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::projector::Projector;
use crate::scheduler::Scheduler;
use crate::story::{FlagOutcome, StoryManager};

/// Handle to a running game.
#[derive(Clone)]
pub struct GameEngine {
    store: Arc<dyn GameStore>,
    config: Arc<GameConfig>,
    ids: IdAllocator,
    broadcaster: Broadcaster,
    candidates: CandidateManager,
    story: StoryManager,
    projector: Projector,
}

impl GameEngine {
    /// Wire all components over one store.
    pub fn new(store: Arc<dyn GameStore>, config: GameConfig) -> Self {
        let config = Arc::new(config);
        let ids = IdAllocator::new(Arc::clone(&store));
        let broadcaster = Broadcaster::new(Arc::clone(&store));
        let story = StoryManager::new(
            Arc::clone(&store),
            Arc::clone(&config),
            ids.clone(),
            broadcaster.clone(),
        );
        let candidates = CandidateManager::new(
            Arc::clone(&store),
            Arc::clone(&config),
            ids.clone(),
            story.clone(),
            broadcaster.clone(),
        );
        let projector = Projector::new(
            Arc::clone(&store),
            Arc::clone(&config),
            candidates.clone(),
            story.clone(),
            broadcaster.clone(),
        );
        Self {
            store,
            config,
            ids,
            broadcaster,
            candidates,
            story,
            projector,
        }
    }

    /// The game rules in effect.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Propose a phrase.
    pub async fn submit_candidate(
        &self,
        creator: &ParticipantId,
        phrase: &str,
    ) -> Result<Candidate, GameError> {
        self.candidates.submit(creator, phrase).await
    }

    /// Toggle a vote on a candidate.
    pub async fn vote(
        &self,
        voter: &ParticipantId,
        id: CandidateId,
    ) -> Result<VoteOutcome, GameError> {
        self.candidates.vote(voter, id).await
    }

    /// Toggle a flag on a story word.
    pub async fn flag_word(
        &self,
        flagger: &ParticipantId,
        id: WordId,
    ) -> Result<FlagOutcome, GameError> {
        self.story.flag(flagger, id).await
    }

    /// Assemble the full current state.
    pub async fn snapshot(&self) -> Result<GameSnapshot, GameError> {
        Ok(self.projector.snapshot().await?)
    }

    /// Mark a participant as connected.
    pub async fn connect(&self, participant: &ParticipantId) -> Result<(), GameError> {
        self.broadcaster.register(participant).await
    }

    /// Mark a participant as gone. Never fails.
    pub async fn disconnect(&self, participant: &ParticipantId) {
        self.broadcaster.deregister(participant).await;
    }

    /// Receive every game event published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        self.broadcaster.subscribe()
    }

    /// A phase scheduler over this engine's store.
    ///
    /// Run exactly one per deployment.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            self.ids.clone(),
            self.candidates.clone(),
            self.story.clone(),
            self.broadcaster.clone(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use zibbit_store::MemoryStore;
    use zibbit_types::{EventKind, GameStatus};

    use super::*;

    async fn playing(config: GameConfig) -> GameEngine {
        let engine = GameEngine::new(Arc::new(MemoryStore::new()), config);
        engine.scheduler().enter_in_play().await;
        engine
    }

    fn p(name: &str) -> ParticipantId {
        ParticipantId::new(name)
    }

    #[tokio::test]
    async fn promote_then_flag_out_a_word() {
        let engine = playing(GameConfig {
            vote_threshold: 2,
            flag_threshold: 2,
            ..GameConfig::default()
        })
        .await;

        let c = engine.submit_candidate(&p("A"), "the cat sat").await.unwrap();
        engine.vote(&p("B"), c.id).await.unwrap();
        assert!(matches!(
            engine.vote(&p("C"), c.id).await.unwrap(),
            VoteOutcome::Promoted { .. }
        ));

        engine.flag_word(&p("B"), WordId::from(2)).await.unwrap();
        assert_eq!(
            engine.flag_word(&p("C"), WordId::from(2)).await.unwrap(),
            FlagOutcome::Removed(WordId::from(2))
        );

        let snapshot = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.phase.status, GameStatus::InPlay);
        assert_eq!(
            snapshot
                .story
                .iter()
                .map(|w| (w.word_id.into_inner(), w.text.as_str()))
                .collect::<Vec<_>>(),
            vec![(1, "the"), (3, "sat")]
        );
        assert!(snapshot.candidates.is_empty());
        assert_eq!(snapshot.constants.vote_threshold, 2);
    }

    #[tokio::test]
    async fn snapshot_lists_live_candidates_with_voters() {
        let engine = playing(GameConfig::default()).await;
        let first = engine.submit_candidate(&p("a"), "one").await.unwrap();
        engine.submit_candidate(&p("b"), "two").await.unwrap();
        engine.vote(&p("b"), first.id).await.unwrap();

        let snapshot = engine.snapshot().await.unwrap();
        assert_eq!(snapshot.candidates.len(), 2);
        let voted = snapshot.candidates.first().unwrap();
        assert_eq!(voted.id, first.id);
        assert_eq!(voted.voters, vec![p("b")]);
        assert_eq!(voted.votes, 1);
    }

    #[tokio::test]
    async fn submission_is_announced() {
        let engine = playing(GameConfig::default()).await;
        let mut events = engine.subscribe();

        engine.submit_candidate(&p("a"), "breaking").await.unwrap();

        let event = events.next().await.unwrap();
        assert_eq!(event.kind, EventKind::CandidateUpdate);
        assert_eq!(event.payload["phrase"], "breaking");
        assert_eq!(event.payload["votes"], 0);
        assert!(event.payload["server_time"].is_f64());
    }

    #[tokio::test]
    async fn engines_over_separate_stores_are_independent() {
        let one = playing(GameConfig::default()).await;
        let two = playing(GameConfig::default()).await;
        one.submit_candidate(&p("a"), "only here").await.unwrap();
        assert!(two.snapshot().await.unwrap().candidates.is_empty());
    }

    #[tokio::test]
    async fn disconnecting_twice_leaves_nobody_connected() {
        let engine = playing(GameConfig::default()).await;
        let a = p("a");
        engine.connect(&a).await.unwrap();

        engine.disconnect(&a).await;
        engine.disconnect(&a).await;

        assert!(engine.snapshot().await.unwrap().connected_users.is_empty());
    }
}
