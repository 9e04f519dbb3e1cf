//! Core records for the Zibbit game.
//!
//! Covers the live [`Candidate`] view, [`StoryWord`], the singleton
//! [`GamePhase`], and the [`GameSnapshot`] sent to new subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::GameStatus;
use crate::ids::{CandidateId, ParticipantId, WordId};

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A proposed phrase awaiting promotion or decay.
///
/// `voters` never contains `creator`. Once `decay_deadline` passes the
/// candidate is gone, whether or not a reader has noticed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Candidate {
    /// Allocated at submission, unique within a game.
    pub id: CandidateId,
    /// Normalized phrase text.
    pub phrase: String,
    /// Participant who proposed the phrase.
    pub creator: ParticipantId,
    /// Participants currently voting for the phrase, sorted.
    pub voters: Vec<ParticipantId>,
    /// Number of entries in `voters`.
    pub votes: u32,
    /// Instant after which the candidate no longer exists.
    pub decay_deadline: DateTime<Utc>,
    /// Set on the terminal `candidate_vote` event when the phrase joined the story.
    #[serde(default)]
    pub promoted: bool,
}

// ---------------------------------------------------------------------------
// StoryWord
// ---------------------------------------------------------------------------

/// One word of the shared story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StoryWord {
    /// Stable identity for the life of the game.
    pub word_id: WordId,
    /// The word itself.
    pub text: String,
    /// Creator of the candidate this word came from.
    pub creator: ParticipantId,
    /// Participants currently flagging the word for removal, sorted.
    pub flaggers: Vec<ParticipantId>,
    /// Number of entries in `flaggers`.
    pub flags: u32,
}

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// The singleton game phase, written only by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GamePhase {
    /// Current status.
    #[serde(rename = "game_status")]
    pub status: GameStatus,
    /// When the current (or last) game started.
    pub start_time: Option<DateTime<Utc>>,
    /// When the current (or last) game ends.
    pub end_time: Option<DateTime<Utc>>,
    /// When the next game starts; only set during cooldown.
    pub next_start_time: Option<DateTime<Utc>>,
}

impl GamePhase {
    /// A running game.
    pub const fn in_play(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            status: GameStatus::InPlay,
            start_time: Some(start_time),
            end_time: Some(end_time),
            next_start_time: None,
        }
    }

    /// A cooldown following `previous`, with the next game at `next_start_time`.
    pub const fn cooldown_after(previous: &Self, next_start_time: DateTime<Utc>) -> Self {
        Self {
            status: GameStatus::Cooldown,
            start_time: previous.start_time,
            end_time: previous.end_time,
            next_start_time: Some(next_start_time),
        }
    }

    /// Whether proposals, votes, and flags are currently accepted.
    pub const fn is_in_play(&self) -> bool {
        matches!(self.status, GameStatus::InPlay)
    }
}

// ---------------------------------------------------------------------------
// Constants and snapshot
// ---------------------------------------------------------------------------

/// The effect-bearing game parameters, echoed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameConstants {
    /// Length of a game in seconds.
    #[ts(type = "number")]
    pub game_length_seconds: u64,
    /// Length of the cooldown between games in seconds.
    #[ts(type = "number")]
    pub game_cooldown_seconds: u64,
    /// Lifetime of an unvoted candidate in seconds.
    #[ts(type = "number")]
    pub candidate_decay_seconds: u64,
    /// How long an identical phrase is blocked after submission.
    #[ts(type = "number")]
    pub candidate_submission_cooldown_seconds: u64,
    /// Decay time bought by the n-th vote is n times this.
    #[ts(type = "number")]
    pub candidate_vote_extension_seconds: u64,
    /// Maximum number of words in a phrase.
    pub max_phrase_word_length: u32,
    /// Votes needed to promote a candidate.
    pub vote_threshold: u32,
    /// Flags needed to remove a story word.
    pub flag_threshold: u32,
    /// Cap on simultaneously live candidates (0 = unbounded).
    pub max_live_candidates: u32,
}

/// Assembled view of the full game state for new subscribers.
///
/// The parts are read independently; clients reconcile via later events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameSnapshot {
    /// The story in order.
    pub story: Vec<StoryWord>,
    /// Live candidates ordered by id.
    pub candidates: Vec<Candidate>,
    /// Phase status and timestamps.
    #[serde(flatten)]
    #[ts(flatten)]
    pub phase: GamePhase,
    /// Participants currently subscribed, sorted.
    pub connected_users: Vec<ParticipantId>,
    /// The game parameters in effect.
    pub constants: GameConstants,
}
