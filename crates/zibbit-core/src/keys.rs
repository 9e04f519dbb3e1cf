//! Store key layout.
//!
//! Ids never contain `:`, and phrases reaching [`cooldown`] have been
//! checked for it, so keys are unambiguous.

use zibbit_types::{CandidateId, EventKind, WordId};

/// The authoritative [`GamePhase`](zibbit_types::GamePhase) record.
pub(crate) const PHASE: &str = "game:phase";

/// Candidate id counter.
pub(crate) const CANDIDATE_IDS: &str = "ids:candidate";

/// Word id counter.
pub(crate) const WORD_IDS: &str = "ids:word";

/// Index of candidate ids that may still be live.
pub(crate) const LIVE_CANDIDATES: &str = "candidates:live";

/// Ids of candidates promoted this game.
pub(crate) const PROMOTED_CANDIDATES: &str = "candidates:promoted";

/// Index of phrase keys with a submission cooldown entry.
pub(crate) const COOLDOWN_INDEX: &str = "cooldowns:index";

/// Ordered list of story word ids.
pub(crate) const STORY: &str = "story:words";

/// Set of connected participants.
pub(crate) const CONNECTED_USERS: &str = "users:connected";

/// Prefix shared by every event topic.
pub(crate) const EVENT_PREFIX: &str = "game_events:";

/// Pattern matching every event topic.
pub(crate) const EVENT_PATTERN: &str = "game_events:*";

pub(crate) fn candidate(id: CandidateId) -> String {
    format!("candidate:{id}")
}

pub(crate) fn voters(id: CandidateId) -> String {
    format!("candidate:{id}:voters")
}

pub(crate) fn cooldown(phrase_key: &str) -> String {
    format!("cooldown:{phrase_key}")
}

pub(crate) fn word(id: WordId) -> String {
    format!("word:{id}")
}

pub(crate) fn flaggers(id: WordId) -> String {
    format!("word:{id}:flaggers")
}

pub(crate) fn topic(kind: EventKind) -> String {
    format!("{EVENT_PREFIX}{kind}")
}
