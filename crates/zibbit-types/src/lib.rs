//! Shared type definitions for the Zibbit consensus game.
//!
//! This crate is the single source of truth for the records that flow
//! between the store, the game engine, and the browser client. Types
//! defined here flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for candidate, word, and participant identifiers
//! - [`enums`] -- Game status and event kinds
//! - [`structs`] -- Candidates, story words, phase, and snapshot records

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventKind, GameStatus};
pub use ids::{CandidateId, ParticipantId, WordId};
pub use structs::{Candidate, GameConstants, GamePhase, GameSnapshot, StoryWord};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::CandidateId::export_all();
        let _ = crate::ids::WordId::export_all();
        let _ = crate::ids::ParticipantId::export_all();

        let _ = crate::enums::GameStatus::export_all();
        let _ = crate::enums::EventKind::export_all();

        let _ = crate::structs::Candidate::export_all();
        let _ = crate::structs::StoryWord::export_all();
        let _ = crate::structs::GamePhase::export_all();
        let _ = crate::structs::GameConstants::export_all();
        let _ = crate::structs::GameSnapshot::export_all();
    }
}
