//! Full state snapshots for newly connected subscribers.
//!
//! The parts of a snapshot are read one after another without a global
//! lock, so a snapshot may straddle a concurrent mutation. Subscribers
//! converge through the events that follow.

use std::sync::Arc;

use zibbit_store::{GameStore, StoreError};
use zibbit_types::GameSnapshot;

use crate::broadcast::Broadcaster;
use crate::candidates::CandidateManager;
use crate::config::GameConfig;
use crate::phase;
use crate::story::StoryManager;

/// Assembles [`GameSnapshot`]s.
#[derive(Clone)]
pub struct Projector {
    store: Arc<dyn GameStore>,
    config: Arc<GameConfig>,
    candidates: CandidateManager,
    story: StoryManager,
    broadcaster: Broadcaster,
}

impl Projector {
    /// Create a projector over the given components.
    pub fn new(
        store: Arc<dyn GameStore>,
        config: Arc<GameConfig>,
        candidates: CandidateManager,
        story: StoryManager,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            config,
            candidates,
            story,
            broadcaster,
        }
    }

    /// Read the story, live candidates, phase, and presence.
    pub async fn snapshot(&self) -> Result<GameSnapshot, StoreError> {
        let story = self.story.story().await?;
        let candidates = self.candidates.live().await?;
        let phase = phase::load(&*self.store).await?;
        let connected_users = self.broadcaster.connected_users().await?;
        Ok(GameSnapshot {
            story,
            candidates,
            phase,
            connected_users,
            constants: self.config.constants(),
        })
    }
}
