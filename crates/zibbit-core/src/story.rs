//! The shared story: promoted words, flags, and threshold removal.
//!
//! Each word is stored as its own record (`word:{id}`) with a flagger set
//! (`word:{id}:flaggers`), and the story order lives in one list of ids.
//! When a word is removed the list entry is spliced out; the ids of the
//! surrounding words never change.
//!
//! Removal is decided by an atomic claim: of all requests that observe the
//! flag count at or over the threshold, only the one whose delete of the
//! word record succeeds performs the removal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zibbit_store::{GameStore, KeyTtl, StoreError, get_json, set_json};
use zibbit_types::{EventKind, ParticipantId, StoryWord, WordId};

use crate::allocator::IdAllocator;
use crate::broadcast::Broadcaster;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::{keys, phase};

/// Stored form of a story word; flaggers live in their own set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WordRecord {
    word_id: WordId,
    text: String,
    creator: ParticipantId,
}

impl WordRecord {
    fn into_word(self, flaggers: Vec<ParticipantId>) -> StoryWord {
        StoryWord {
            word_id: self.word_id,
            text: self.text,
            creator: self.creator,
            flags: count_of(&flaggers),
            flaggers,
        }
    }
}

/// Result of a successful [`StoryManager::flag`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagOutcome {
    /// The participant's flag was added; the word stays.
    Flagged(StoryWord),
    /// The participant already flagged the word, so the flag was withdrawn.
    Unflagged(StoryWord),
    /// This flag reached the threshold and removed the word.
    Removed(WordId),
    /// The threshold was reached, but a concurrent request removed the word.
    AlreadyRemoved(WordId),
}

/// Reads and mutates the story.
#[derive(Clone)]
pub struct StoryManager {
    store: Arc<dyn GameStore>,
    config: Arc<GameConfig>,
    ids: IdAllocator,
    broadcaster: Broadcaster,
}

impl StoryManager {
    /// Create a story manager.
    pub fn new(
        store: Arc<dyn GameStore>,
        config: Arc<GameConfig>,
        ids: IdAllocator,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            config,
            ids,
            broadcaster,
        }
    }

    /// The story in order, with current flaggers.
    pub async fn story(&self) -> Result<Vec<StoryWord>, StoreError> {
        let mut story = Vec::new();
        for raw in self.store.list_range(keys::STORY).await? {
            let Ok(id) = raw.parse::<WordId>() else {
                warn!(entry = %raw, "Skipping malformed story entry");
                continue;
            };
            // A word removed between the list read and here is simply absent.
            if let Some(word) = self.word(id).await? {
                story.push(word);
            }
        }
        Ok(story)
    }

    /// One story word, if it is still part of the story.
    pub async fn word(&self, id: WordId) -> Result<Option<StoryWord>, StoreError> {
        let Some(record) = get_json::<WordRecord>(&*self.store, &keys::word(id)).await? else {
            return Ok(None);
        };
        let flaggers = self.flaggers(id).await?;
        Ok(Some(record.into_word(flaggers)))
    }

    /// Append the words of `phrase` to the end of the story.
    ///
    /// The block of ids is reserved in one step, the word records are
    /// written, and the ids are appended to the story list last.
    pub async fn append(
        &self,
        phrase: &str,
        creator: &ParticipantId,
    ) -> Result<Vec<StoryWord>, GameError> {
        let words = self.stage(phrase, creator).await?;
        if let Err(e) = self.commit(&words).await {
            self.discard(&words).await;
            return Err(e.into());
        }
        Ok(words)
    }

    /// Reserve ids and write word records for `phrase` without making
    /// them part of the story yet.
    ///
    /// Staged words are invisible to [`StoryManager::story`] until
    /// [`StoryManager::commit`]. On failure nothing staged is left behind.
    pub(crate) async fn stage(
        &self,
        phrase: &str,
        creator: &ParticipantId,
    ) -> Result<Vec<StoryWord>, GameError> {
        let texts: Vec<&str> = phrase.split_whitespace().collect();
        let count = u64::try_from(texts.len()).unwrap_or(u64::MAX);
        let ids = self.ids.allocate_word_ids(count).await?;

        let mut words = Vec::with_capacity(ids.len());
        for (word_id, text) in ids.iter().copied().zip(texts) {
            let record = WordRecord {
                word_id,
                text: text.to_owned(),
                creator: creator.clone(),
            };
            if let Err(e) = set_json(&*self.store, &keys::word(word_id), &record, None).await {
                self.discard(&words).await;
                return Err(e.into());
            }
            words.push(record.into_word(Vec::new()));
        }
        Ok(words)
    }

    /// Append staged words to the story in one list push.
    pub(crate) async fn commit(&self, words: &[StoryWord]) -> Result<(), StoreError> {
        if words.is_empty() {
            return Ok(());
        }
        let entries: Vec<String> = words.iter().map(|w| w.word_id.to_string()).collect();
        self.store.list_push(keys::STORY, &entries).await
    }

    /// Delete the records of staged words that will never be committed.
    ///
    /// Their ids stay consumed.
    pub(crate) async fn discard(&self, words: &[StoryWord]) {
        for word in words {
            if let Err(e) = self.store.delete(&keys::word(word.word_id)).await {
                warn!(word_id = %word.word_id, error = %e, "Failed to discard staged word");
            }
        }
    }

    /// Toggle `participant`'s flag on a story word.
    ///
    /// When an added flag brings the count to the flag threshold the word
    /// is removed from the story, exactly once across all concurrent
    /// callers.
    pub async fn flag(
        &self,
        participant: &ParticipantId,
        id: WordId,
    ) -> Result<FlagOutcome, GameError> {
        phase::require_in_play(&*self.store).await?;

        let word_key = keys::word(id);
        let Some(record) = get_json::<WordRecord>(&*self.store, &word_key).await? else {
            return Err(GameError::NoSuchWord(id));
        };

        let flaggers_key = keys::flaggers(id);
        let added = self
            .store
            .set_add(&flaggers_key, participant.as_str())
            .await?;
        if !added {
            self.store
                .set_remove(&flaggers_key, participant.as_str())
                .await?;
        }

        if self.store.ttl(&word_key).await? == KeyTtl::Missing {
            // Removed concurrently; drop the flagger set we may have recreated.
            self.store.delete(&flaggers_key).await?;
            return Err(GameError::NoSuchWord(id));
        }

        let flaggers = self.flaggers(id).await?;
        if added && count_of(&flaggers) >= self.config.flag_threshold {
            return self.remove(id).await;
        }

        let word = record.into_word(flaggers);
        debug!(word_id = %id, flags = word.flags, added, "Word flag toggled");
        self.broadcaster.announce(EventKind::WordFlag, &word).await;
        Ok(if added {
            FlagOutcome::Flagged(word)
        } else {
            FlagOutcome::Unflagged(word)
        })
    }

    /// Announce the full story to subscribers.
    pub async fn announce_story(&self) {
        match self.story().await {
            Ok(story) => {
                let payload = serde_json::json!({ "story": story });
                self.broadcaster
                    .announce(EventKind::StoryUpdate, &payload)
                    .await;
            }
            Err(e) => warn!(error = %e, "Failed to read story for announcement"),
        }
    }

    /// Delete every word, flagger set, and the story list.
    pub async fn reset(&self) -> Result<(), StoreError> {
        for raw in self.store.list_range(keys::STORY).await? {
            if let Ok(id) = raw.parse::<WordId>() {
                self.store.delete(&keys::word(id)).await?;
                self.store.delete(&keys::flaggers(id)).await?;
            }
        }
        self.store.delete(keys::STORY).await?;
        Ok(())
    }

    async fn remove(&self, id: WordId) -> Result<FlagOutcome, GameError> {
        if !self.store.delete(&keys::word(id)).await? {
            debug!(word_id = %id, "Word removal claimed by another request");
            return Ok(FlagOutcome::AlreadyRemoved(id));
        }
        self.store
            .list_remove(keys::STORY, &id.to_string())
            .await?;
        if let Err(e) = self.store.delete(&keys::flaggers(id)).await {
            warn!(word_id = %id, error = %e, "Failed to clear flaggers of removed word");
        }
        info!(word_id = %id, "Word removed from the story by flags");
        self.announce_story().await;
        Ok(FlagOutcome::Removed(id))
    }

    async fn flaggers(&self, id: WordId) -> Result<Vec<ParticipantId>, StoreError> {
        let mut flaggers: Vec<ParticipantId> = self
            .store
            .set_members(&keys::flaggers(id))
            .await?
            .into_iter()
            .map(ParticipantId::from)
            .collect();
        flaggers.sort();
        Ok(flaggers)
    }
}

/// Length of a participant list as a vote or flag count.
pub(crate) fn count_of(participants: &[ParticipantId]) -> u32 {
    u32::try_from(participants.len()).unwrap_or(u32::MAX)
}
