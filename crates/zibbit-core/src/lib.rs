//! Consensus game engine for Zibbit.
//!
//! Participants propose short phrases, vote them into a shared story, and
//! flag story words for removal, all under a repeating timed game cycle.
//! Every component is a thin handle over an [`Arc<dyn GameStore>`]; no
//! in-process lock serializes requests. Threshold crossings are resolved
//! by a single atomic claim in the store.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `zibbit-config.yaml` plus env overrides.
//! - [`error`] -- [`GameError`] and its [`ErrorKind`] classification.
//! - [`allocator`] -- Monotonic candidate and word id allocation.
//! - [`candidates`] -- Proposal, decay, voting, and promotion.
//! - [`story`] -- Story words, flagging, and threshold removal.
//! - [`broadcast`] -- Typed event publishing and presence tracking.
//! - [`projector`] -- Full game state snapshots for new subscribers.
//! - [`clock`] -- Wall-clock time, deadlines, and `server_time` stamps.
//! - [`phase`] -- Reading and writing the authoritative [`GamePhase`].
//! - [`scheduler`] -- The `IN_PLAY` / `COOLDOWN` background loop.
//! - [`engine`] -- [`GameEngine`], the handle bundling all of the above.
//!
//! [`Arc<dyn GameStore>`]: zibbit_store::GameStore
//! [`GamePhase`]: zibbit_types::GamePhase
//! [`GameError`]: error::GameError
//! [`ErrorKind`]: error::ErrorKind
//! [`GameEngine`]: engine::GameEngine

pub mod allocator;
pub mod broadcast;
pub mod candidates;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod phase;
pub mod projector;
pub mod scheduler;
pub mod story;

mod keys;
#[cfg(test)]
mod testing;

pub use engine::GameEngine;
pub use error::{ErrorKind, GameError};
