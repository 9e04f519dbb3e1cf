//! Game API server for Zibbit.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Server-sent events** (`GET /events`): a `game_state` snapshot on
//!   connect, then every game event as it is published
//! - **Mutation endpoints** (`POST /submit_candidate`, `POST /vote`,
//!   `POST /flag_word`)
//! - **State endpoint** (`GET /api/state`) returning the same snapshot
//!   as JSON
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Handlers hold no game state of their own. Every request goes through
//! the shared [`GameEngine`](zibbit_core::GameEngine), so any number of
//! server instances can run against one store. Participants are
//! identified by [`identity::Participant`]: the first `X-Forwarded-For`
//! entry, else the peer address.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod router;
pub mod server;
pub mod sse;
pub mod startup;
pub mod state;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
