//! Expiring shared store for the Zibbit consensus game.
//!
//! The game engine coordinates concurrent participants exclusively through
//! the primitives of a keyed store: per-key TTL, atomic increment, an
//! exactly-once delete claim, lists, sets, and topic publish/subscribe.
//! This crate defines that contract and provides two implementations.
//!
//! # Architecture
//!
//! ```text
//! GameEngine (zibbit-core)
//!     |
//!     +-- Arc<dyn GameStore>
//!         |-- DragonflyPool   (fred client + pattern subscriber)
//!         +-- MemoryStore     (tokio-timed in-process fake)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`GameStore`] trait, [`KeyTtl`], [`TopicMessage`], JSON helpers
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) implementation
//! - [`memory`] -- In-memory implementation with identical claim semantics
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{GameStore, KeyTtl, TopicMessage, get_json, set_json};
