//! Axum router construction for the game API.
//!
//! Assembles all routes (REST + SSE) into a single [`Router`] with
//! permissive CORS so browser clients on any origin can play.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::sse;
use crate::state::AppState;

/// Build the complete Axum router for the game server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /events` -- server-sent event stream
/// - `GET /api/state` -- current game snapshot
/// - `POST /submit_candidate` -- propose a phrase
/// - `POST /vote` -- toggle a vote
/// - `POST /flag_word` -- toggle a flag
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // Event stream
        .route("/events", get(sse::events))
        // Game API
        .route("/api/state", get(handlers::get_state))
        .route("/submit_candidate", post(handlers::submit_candidate))
        .route("/vote", post(handlers::vote))
        .route("/flag_word", post(handlers::flag_word))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
