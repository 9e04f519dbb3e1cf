//! Errors returned by game operations.
//!
//! Every [`GameError`] falls into one [`ErrorKind`], which is what callers
//! (the HTTP layer in particular) dispatch on.

use serde::Serialize;
use zibbit_store::StoreError;
use zibbit_types::{CandidateId, WordId};

/// Broad classification of a [`GameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself is malformed.
    Validation,
    /// The referenced candidate or word does not exist (any more).
    NotFound,
    /// The request is well-formed but the game state forbids it.
    Conflict,
    /// The store failed; the caller may retry.
    TransientStore,
}

impl ErrorKind {
    /// Wire name used in error bodies.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::TransientStore => "transient_store",
        }
    }
}

/// Errors from submitting, voting, flagging, and reading game state.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The phrase is empty after whitespace normalization.
    #[error("phrase is empty")]
    EmptyPhrase,

    /// The phrase has more words than allowed.
    #[error("phrase has {words} words, the limit is {max}")]
    PhraseTooLong {
        /// Number of words submitted.
        words: usize,
        /// Configured maximum.
        max: u32,
    },

    /// The phrase contains a character reserved by the key layout.
    #[error("phrase contains reserved character {0:?}")]
    ReservedCharacter(char),

    /// No live candidate with this id.
    #[error("candidate {0} does not exist")]
    NoSuchCandidate(CandidateId),

    /// No story word with this id.
    #[error("word {0} does not exist")]
    NoSuchWord(WordId),

    /// An identical phrase was submitted too recently.
    #[error("phrase {0:?} was submitted recently, try again later")]
    PhraseOnCooldown(String),

    /// Participants cannot vote for their own candidate.
    #[error("cannot vote for your own candidate")]
    SelfVote,

    /// The game is in cooldown.
    #[error("the game is not in play")]
    NotInPlay,

    /// The live candidate cap is reached.
    #[error("too many live candidates (limit {limit})")]
    TooManyCandidates {
        /// Configured cap.
        limit: u32,
    },

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GameError {
    /// Classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPhrase | Self::PhraseTooLong { .. } | Self::ReservedCharacter(_) => {
                ErrorKind::Validation
            }
            Self::NoSuchCandidate(_) | Self::NoSuchWord(_) => ErrorKind::NotFound,
            Self::PhraseOnCooldown(_)
            | Self::SelfVote
            | Self::NotInPlay
            | Self::TooManyCandidates { .. } => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::TransientStore,
        }
    }
}

impl From<serde_json::Error> for GameError {
    fn from(source: serde_json::Error) -> Self {
        Self::Store(StoreError::Serialization(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_each_family() {
        assert_eq!(GameError::EmptyPhrase.kind(), ErrorKind::Validation);
        assert_eq!(
            GameError::NoSuchWord(WordId::from(4)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(GameError::SelfVote.kind(), ErrorKind::Conflict);
        assert_eq!(
            GameError::Store(StoreError::WrongType("k".to_owned())).kind(),
            ErrorKind::TransientStore
        );
    }

    #[test]
    fn kind_wire_names_match_serde() {
        let json = serde_json::to_value(ErrorKind::TransientStore).ok();
        assert_eq!(
            json.as_ref().and_then(|v| v.as_str()),
            Some(ErrorKind::TransientStore.as_str())
        );
    }
}
