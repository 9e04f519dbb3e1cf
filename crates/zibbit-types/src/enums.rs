//! Enumeration types for the Zibbit game.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Game status
// ---------------------------------------------------------------------------

/// The phase the game cycle is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum GameStatus {
    /// Between games. Proposals, votes, and flags are closed.
    #[default]
    Cooldown,
    /// A game is running.
    InPlay,
}

impl GameStatus {
    /// Wire name of the status (`COOLDOWN` or `IN_PLAY`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cooldown => "COOLDOWN",
            Self::InPlay => "IN_PLAY",
        }
    }
}

impl core::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Typed state-change notifications published to subscribers.
///
/// Each kind is published on its own topic, `game_events:{kind}`, so
/// ordering is only guaranteed within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// A new game has started; all game data was reset.
    GameStart,
    /// The game ended and a cooldown began.
    GameEnd,
    /// A candidate was proposed.
    CandidateUpdate,
    /// A candidate's vote state changed (including promotion).
    CandidateVote,
    /// The story changed; carries the full story.
    StoryUpdate,
    /// A story word's flag state changed.
    WordFlag,
    /// The set of connected participants changed.
    UserConnections,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::GameStart,
        Self::GameEnd,
        Self::CandidateUpdate,
        Self::CandidateVote,
        Self::StoryUpdate,
        Self::WordFlag,
        Self::UserConnections,
    ];

    /// Wire name of the event, also used as the topic suffix.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GameStart => "game_start",
            Self::GameEnd => "game_end",
            Self::CandidateUpdate => "candidate_update",
            Self::CandidateVote => "candidate_vote",
            Self::StoryUpdate => "story_update",
            Self::WordFlag => "word_flag",
            Self::UserConnections => "user_connections",
        }
    }

    /// Look up an event kind by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_screaming_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&GameStatus::InPlay).unwrap(),
            "\"IN_PLAY\""
        );
        assert_eq!(GameStatus::Cooldown.to_string(), "COOLDOWN");
    }

    #[test]
    fn event_names_round_trip_through_lookup() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(EventKind::from_name("game_state"), None);
    }
}
