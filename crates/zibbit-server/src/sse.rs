//! Server-sent event stream of game state.
//!
//! Clients connect to `GET /events`. The first event is `game_state`
//! carrying a full [`GameSnapshot`](zibbit_types::GameSnapshot); after
//! that every published game event is forwarded under its own event name
//! (`candidate_update`, `story_update`, ...). Each payload is stamped with
//! the delivery `server_time`.
//!
//! The participant is registered as connected for the life of the stream
//! and deregistered when the client goes away. If a client falls behind,
//! lagged events are skipped; clients reconcile on their next snapshot.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream;
use serde_json::Value;
use tracing::{debug, warn};
use zibbit_core::broadcast::{EventSubscription, GameEvent, stamp};
use zibbit_core::{GameEngine, clock};
use zibbit_types::ParticipantId;

use crate::error::ApiError;
use crate::identity::Participant;
use crate::state::AppState;

/// Name of the initial snapshot event.
pub const GAME_STATE_EVENT: &str = "game_state";

/// Open the event stream for the calling participant.
///
/// # Route
///
/// `GET /events`
pub async fn events(
    State(state): State<Arc<AppState>>,
    Participant(participant): Participant,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();

    // Subscribe before reading the snapshot so nothing in between is lost.
    let subscription = engine.subscribe();
    engine.connect(&participant).await?;
    let presence = Presence {
        engine: engine.clone(),
        participant,
    };

    let snapshot = serde_json::to_value(engine.snapshot().await?)?;
    let first = frame(GAME_STATE_EVENT, snapshot);
    debug!(participant = %presence.participant, "Event stream opened");

    let feed = Feed {
        first: Some(first),
        subscription,
        _presence: presence,
    };
    let events = stream::unfold(feed, |mut feed| async move {
        if let Some(first) = feed.first.take() {
            return Some((Ok::<_, Infallible>(first), feed));
        }
        let GameEvent { kind, payload } = feed.subscription.next().await?;
        Some((Ok(frame(kind.as_str(), payload)), feed))
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text("keep-alive"),
    ))
}

/// Render one SSE event with a fresh `server_time`.
fn frame(name: &str, payload: Value) -> Event {
    let data = stamp(payload, clock::now()).to_string();
    Event::default().event(name).data(data)
}

/// Per-connection stream state.
struct Feed {
    first: Option<Event>,
    subscription: EventSubscription,
    _presence: Presence,
}

/// Deregisters the participant when the stream is dropped.
struct Presence {
    engine: GameEngine,
    participant: ParticipantId,
}

impl Drop for Presence {
    fn drop(&mut self) {
        let engine = self.engine.clone();
        let participant = self.participant.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%participant, "Event stream closed");
                handle.spawn(async move { engine.disconnect(&participant).await });
            }
            Err(_) => warn!(%participant, "No runtime to deregister participant on"),
        }
    }
}
