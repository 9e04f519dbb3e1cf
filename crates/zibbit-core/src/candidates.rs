//! Candidate phrases: proposal, decay, voting, and promotion.
//!
//! A candidate record (`candidate:{id}`) carries a store TTL that *is* its
//! decay deadline, so an unvoted candidate disappears without any sweeper.
//! Votes are a set (`candidate:{id}:voters`) whose TTL follows the record.
//! A submitted phrase also claims a cooldown entry (`cooldown:{phrase}`)
//! that blocks identical submissions for at least as long as the
//! candidate can live.
//!
//! # Promotion
//!
//! When an added vote brings the count to the vote threshold, the request
//! tries to claim the candidate by deleting its record. Exactly one
//! concurrent request wins that delete; only the winner appends the words
//! to the story. Everyone else reports success without side effects.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use zibbit_store::{GameStore, KeyTtl, StoreError, get_json, set_json};
use zibbit_types::{Candidate, CandidateId, EventKind, ParticipantId, StoryWord};

use crate::allocator::IdAllocator;
use crate::broadcast::Broadcaster;
use crate::clock;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::story::{StoryManager, count_of};
use crate::{keys, phase};

/// Normalize a submitted phrase.
///
/// Surrounding whitespace is trimmed and inner runs collapse to one
/// space. Case is kept for display. `:` and non-whitespace control
/// characters are rejected, as are empty phrases and phrases longer than
/// `max_words` words.
pub fn normalize_phrase(raw: &str, max_words: u32) -> Result<String, GameError> {
    if let Some(c) = raw
        .chars()
        .find(|&c| c == ':' || (c.is_control() && !c.is_whitespace()))
    {
        return Err(GameError::ReservedCharacter(c));
    }
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.is_empty() {
        return Err(GameError::EmptyPhrase);
    }
    if !u32::try_from(words.len()).is_ok_and(|n| n <= max_words) {
        return Err(GameError::PhraseTooLong {
            words: words.len(),
            max: max_words,
        });
    }
    Ok(words.join(" "))
}

/// Identity of a normalized phrase for duplicate suppression.
pub fn phrase_key(phrase: &str) -> String {
    phrase.to_lowercase()
}

/// Stored form of a candidate; votes live in their own set and the decay
/// deadline is the record's TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CandidateRecord {
    id: CandidateId,
    phrase: String,
    creator: ParticipantId,
}

impl CandidateRecord {
    fn into_candidate(
        self,
        voters: Vec<ParticipantId>,
        decay_deadline: chrono::DateTime<chrono::Utc>,
        promoted: bool,
    ) -> Candidate {
        Candidate {
            id: self.id,
            phrase: self.phrase,
            creator: self.creator,
            votes: count_of(&voters),
            voters,
            decay_deadline,
            promoted,
        }
    }
}

/// Result of a successful [`CandidateManager::vote`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was added and extended the candidate's life.
    Voted(Candidate),
    /// The participant had already voted, so the vote was withdrawn.
    Unvoted(Candidate),
    /// This vote reached the threshold and moved the phrase into the story.
    Promoted {
        /// Final state of the candidate, with `promoted` set.
        candidate: Candidate,
        /// The story words created from the phrase.
        words: Vec<StoryWord>,
    },
    /// The threshold was reached, but a concurrent vote promoted it.
    AlreadyPromoted(CandidateId),
}

/// Proposes, votes on, and promotes candidates.
#[derive(Clone)]
pub struct CandidateManager {
    store: Arc<dyn GameStore>,
    config: Arc<GameConfig>,
    ids: IdAllocator,
    story: StoryManager,
    broadcaster: Broadcaster,
}

impl CandidateManager {
    /// Create a candidate manager.
    pub fn new(
        store: Arc<dyn GameStore>,
        config: Arc<GameConfig>,
        ids: IdAllocator,
        story: StoryManager,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            store,
            config,
            ids,
            story,
            broadcaster,
        }
    }

    /// Propose a phrase as a new candidate.
    ///
    /// Fails with [`GameError::PhraseOnCooldown`] if the same phrase
    /// (ignoring case) was proposed within the submission cooldown.
    pub async fn submit(
        &self,
        creator: &ParticipantId,
        raw_phrase: &str,
    ) -> Result<Candidate, GameError> {
        let phrase = normalize_phrase(raw_phrase, self.config.max_phrase_word_length)?;
        phase::require_in_play(&*self.store).await?;

        let limit = self.config.max_live_candidates;
        if limit > 0 && self.live_count().await? >= u64::from(limit) {
            return Err(GameError::TooManyCandidates { limit });
        }

        let key = phrase_key(&phrase);
        let cooldown_key = keys::cooldown(&key);
        let claimed = self
            .store
            .set_if_absent(
                &cooldown_key,
                creator.as_str(),
                self.config.submission_cooldown(),
            )
            .await?;
        if !claimed {
            return Err(GameError::PhraseOnCooldown(phrase));
        }

        match self.create(creator, phrase, &key).await {
            Ok(candidate) => {
                info!(candidate_id = %candidate.id, %creator, "Candidate submitted");
                self.broadcaster
                    .announce(EventKind::CandidateUpdate, &candidate)
                    .await;
                Ok(candidate)
            }
            Err(e) => {
                // Free the phrase so the participant can retry.
                if let Err(cleanup) = self.store.delete(&cooldown_key).await {
                    warn!(error = %cleanup, "Failed to release phrase cooldown");
                }
                Err(e)
            }
        }
    }

    /// Toggle `voter`'s vote on a live candidate.
    ///
    /// An added vote that brings the count to `n` extends the remaining
    /// decay time by `n` extension units, or promotes the candidate once
    /// `n` reaches the vote threshold. Withdrawing a vote never shortens
    /// the deadline. If an added vote cannot be fully applied it is
    /// withdrawn again before the error is returned.
    pub async fn vote(
        &self,
        voter: &ParticipantId,
        id: CandidateId,
    ) -> Result<VoteOutcome, GameError> {
        phase::require_in_play(&*self.store).await?;

        let Some(record) = get_json::<CandidateRecord>(&*self.store, &keys::candidate(id)).await?
        else {
            return Err(GameError::NoSuchCandidate(id));
        };
        if record.creator == *voter {
            return Err(GameError::SelfVote);
        }

        let voters_key = keys::voters(id);
        let added = self.store.set_add(&voters_key, voter.as_str()).await?;
        if !added {
            self.store.set_remove(&voters_key, voter.as_str()).await?;
        }

        let outcome = self.settle_vote(record, added).await;
        if added && outcome.is_err() {
            self.withdraw(id, voter).await;
        }
        outcome
    }

    async fn withdraw(&self, id: CandidateId, voter: &ParticipantId) {
        if let Err(e) = self.store.set_remove(&keys::voters(id), voter.as_str()).await {
            warn!(candidate_id = %id, %voter, error = %e, "Failed to withdraw vote after error");
        }
    }

    /// Apply a toggled vote: promote, extend, or just report.
    async fn settle_vote(
        &self,
        record: CandidateRecord,
        added: bool,
    ) -> Result<VoteOutcome, GameError> {
        let id = record.id;
        let candidate_key = keys::candidate(id);
        let ttl = self.store.ttl(&candidate_key).await?;
        if ttl == KeyTtl::Missing {
            return self.vanished(id, added).await;
        }
        let remaining = ttl.remaining().unwrap_or_default();

        let voters = self.voters(id).await?;
        let votes = count_of(&voters);
        if added && votes >= self.config.vote_threshold {
            return self.promote(record, voters, remaining).await;
        }

        let outcome = if added {
            let extended = remaining.saturating_add(self.config.vote_extension(votes));
            if !self.store.expire(&candidate_key, extended).await? {
                return self.vanished(id, added).await;
            }
            self.store.expire(&keys::voters(id), extended).await?;
            self.hold_phrase(&record.phrase, extended).await?;
            let deadline = clock::after(clock::now(), extended);
            VoteOutcome::Voted(record.into_candidate(voters, deadline, false))
        } else {
            let deadline = clock::after(clock::now(), remaining);
            VoteOutcome::Unvoted(record.into_candidate(voters, deadline, false))
        };

        if let VoteOutcome::Voted(candidate) | VoteOutcome::Unvoted(candidate) = &outcome {
            debug!(candidate_id = %id, votes = candidate.votes, added, "Candidate vote toggled");
            self.broadcaster
                .announce(EventKind::CandidateVote, candidate)
                .await;
        }
        Ok(outcome)
    }

    /// The candidate disappeared after this vote read it.
    ///
    /// An added vote that lost the race to a promotion still counted, so it
    /// reports [`VoteOutcome::AlreadyPromoted`]; one that lost to decay is
    /// [`GameError::NoSuchCandidate`].
    async fn vanished(&self, id: CandidateId, added: bool) -> Result<VoteOutcome, GameError> {
        // The toggle may have recreated the voter set without a TTL.
        self.store.delete(&keys::voters(id)).await?;
        if added && self.was_promoted(id).await? {
            debug!(candidate_id = %id, "Vote raced a promotion");
            return Ok(VoteOutcome::AlreadyPromoted(id));
        }
        Err(GameError::NoSuchCandidate(id))
    }

    /// Live candidates ordered by id.
    ///
    /// Index entries whose record has decayed are pruned on the way.
    pub async fn live(&self) -> Result<Vec<Candidate>, StoreError> {
        let mut candidates = Vec::new();
        for id in self.indexed_ids().await? {
            match self.candidate(id).await? {
                Some(candidate) => candidates.push(candidate),
                None => self.prune(id).await?,
            }
        }
        Ok(candidates)
    }

    /// One live candidate, if it has not decayed or been promoted.
    pub async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        let candidate_key = keys::candidate(id);
        let Some(record) = get_json::<CandidateRecord>(&*self.store, &candidate_key).await? else {
            return Ok(None);
        };
        let deadline = match self.store.ttl(&candidate_key).await? {
            KeyTtl::Missing => return Ok(None),
            KeyTtl::Persistent => chrono::DateTime::<chrono::Utc>::MAX_UTC,
            KeyTtl::Expires(remaining) => clock::after(clock::now(), remaining),
        };
        let voters = self.voters(id).await?;
        Ok(Some(record.into_candidate(voters, deadline, false)))
    }

    /// Delete every candidate, voter set, promotion record, and phrase cooldown.
    pub async fn reset(&self) -> Result<(), StoreError> {
        for id in self.indexed_ids().await? {
            self.store.delete(&keys::candidate(id)).await?;
            self.store.delete(&keys::voters(id)).await?;
        }
        self.store.delete(keys::LIVE_CANDIDATES).await?;
        self.store.delete(keys::PROMOTED_CANDIDATES).await?;

        for key in self.store.set_members(keys::COOLDOWN_INDEX).await? {
            self.store.delete(&keys::cooldown(&key)).await?;
        }
        self.store.delete(keys::COOLDOWN_INDEX).await?;
        Ok(())
    }

    async fn create(
        &self,
        creator: &ParticipantId,
        phrase: String,
        phrase_key: &str,
    ) -> Result<Candidate, GameError> {
        let id = self.ids.next_candidate_id().await?;
        self.store.set_add(keys::COOLDOWN_INDEX, phrase_key).await?;
        self.store
            .set_add(keys::LIVE_CANDIDATES, &id.to_string())
            .await?;

        let record = CandidateRecord {
            id,
            phrase,
            creator: creator.clone(),
        };
        let decay = self.config.candidate_decay();
        set_json(&*self.store, &keys::candidate(id), &record, Some(decay)).await?;
        Ok(record.into_candidate(Vec::new(), clock::after(clock::now(), decay), false))
    }

    /// Move a candidate into the story, exactly once.
    ///
    /// The words are staged first, then the candidate record is claimed
    /// with a delete, then the words are committed. A failure before the
    /// claim leaves the candidate untouched; a failed commit puts the
    /// record back with the lifetime it had.
    async fn promote(
        &self,
        record: CandidateRecord,
        voters: Vec<ParticipantId>,
        remaining: Duration,
    ) -> Result<VoteOutcome, GameError> {
        let id = record.id;
        let words = self.story.stage(&record.phrase, &record.creator).await?;

        let claimed = match self.store.delete(&keys::candidate(id)).await {
            Ok(claimed) => claimed,
            Err(e) => {
                self.story.discard(&words).await;
                return Err(e.into());
            }
        };
        if !claimed {
            self.story.discard(&words).await;
            debug!(candidate_id = %id, "Promotion claimed by another request");
            return Ok(VoteOutcome::AlreadyPromoted(id));
        }
        if let Err(e) = self
            .store
            .set_add(keys::PROMOTED_CANDIDATES, &id.to_string())
            .await
        {
            warn!(candidate_id = %id, error = %e, "Failed to record promotion");
        }

        if let Err(e) = self.story.commit(&words).await {
            self.story.discard(&words).await;
            self.restore(&record, remaining).await;
            return Err(e.into());
        }

        if let Err(e) = self.store.delete(&keys::voters(id)).await {
            warn!(candidate_id = %id, error = %e, "Failed to clear voters of promoted candidate");
        }
        if let Err(e) = self.prune(id).await {
            warn!(candidate_id = %id, error = %e, "Failed to unindex promoted candidate");
        }

        let candidate = record.into_candidate(voters, clock::now(), true);
        info!(candidate_id = %id, words = words.len(), "Candidate promoted into the story");
        self.broadcaster
            .announce(EventKind::CandidateVote, &candidate)
            .await;
        self.story.announce_story().await;
        Ok(VoteOutcome::Promoted { candidate, words })
    }

    /// Undo a won promotion claim whose words never reached the story.
    async fn restore(&self, record: &CandidateRecord, remaining: Duration) {
        let id = record.id;
        let ttl = remaining.max(Duration::from_millis(1));
        match set_json(&*self.store, &keys::candidate(id), record, Some(ttl)).await {
            Ok(()) => warn!(candidate_id = %id, "Promotion aborted, candidate restored"),
            Err(e) => error!(
                candidate_id = %id,
                error = %e,
                "Failed to restore candidate after aborted promotion"
            ),
        }
        if let Err(e) = self
            .store
            .set_remove(keys::PROMOTED_CANDIDATES, &id.to_string())
            .await
        {
            warn!(candidate_id = %id, error = %e, "Failed to clear promotion record");
        }
    }

    async fn was_promoted(&self, id: CandidateId) -> Result<bool, StoreError> {
        let id = id.to_string();
        Ok(self
            .store
            .set_members(keys::PROMOTED_CANDIDATES)
            .await?
            .contains(&id))
    }

    /// Keep the phrase blocked for at least `ttl`, never shortening the
    /// current block.
    async fn hold_phrase(&self, phrase: &str, ttl: Duration) -> Result<(), StoreError> {
        let hold = ttl.max(self.config.submission_cooldown());
        let key = phrase_key(phrase);
        self.store
            .set(&keys::cooldown(&key), "held", Some(hold))
            .await?;
        self.store.set_add(keys::COOLDOWN_INDEX, &key).await?;
        Ok(())
    }

    async fn live_count(&self) -> Result<u64, StoreError> {
        let mut live = 0_u64;
        for id in self.indexed_ids().await? {
            if self.store.ttl(&keys::candidate(id)).await? == KeyTtl::Missing {
                self.prune(id).await?;
            } else {
                live = live.saturating_add(1);
            }
        }
        Ok(live)
    }

    async fn indexed_ids(&self) -> Result<Vec<CandidateId>, StoreError> {
        let mut ids: Vec<CandidateId> = self
            .store
            .set_members(keys::LIVE_CANDIDATES)
            .await?
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn voters(&self, id: CandidateId) -> Result<Vec<ParticipantId>, StoreError> {
        let mut voters: Vec<ParticipantId> = self
            .store
            .set_members(&keys::voters(id))
            .await?
            .into_iter()
            .map(ParticipantId::from)
            .collect();
        voters.sort();
        Ok(voters)
    }

    async fn prune(&self, id: CandidateId) -> Result<(), StoreError> {
        self.store
            .set_remove(keys::LIVE_CANDIDATES, &id.to_string())
            .await?;
        Ok(())
    }
}
