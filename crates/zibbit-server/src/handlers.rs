//! REST endpoint handlers for the game API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/state` | Current game snapshot |
//! | `POST` | `/submit_candidate` | Propose a phrase: `{"phrase": "..."}` |
//! | `POST` | `/vote` | Toggle a vote: `{"candidate_id": 3}` |
//! | `POST` | `/flag_word` | Toggle a flag: `{"word_id": 7}` |
//!
//! Ids are accepted as JSON numbers or numeric strings.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{Html, IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zibbit_core::candidates::VoteOutcome;
use zibbit_core::story::FlagOutcome;
use zibbit_types::{Candidate, CandidateId, GameSnapshot, StoryWord, WordId};

use crate::error::ApiError;
use crate::identity::Participant;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /submit_candidate`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// The proposed phrase.
    pub phrase: String,
}

/// Body of `POST /vote`.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// Candidate to vote on.
    pub candidate_id: IdInput,
}

/// Body of `POST /flag_word`.
#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    /// Story word to flag.
    pub word_id: IdInput,
}

/// A numeric id sent either as a number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    /// `3`
    Number(u64),
    /// `"3"`
    Text(String),
}

impl IdInput {
    fn parse(&self, field: &str) -> Result<u64, ApiError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("{field}: {e}"))),
        }
    }
}

/// Successful mutation response.
#[derive(Debug, Serialize)]
pub struct Ack<T: Serialize> {
    /// Always `"success"`.
    pub status: &'static str,
    /// What happened, e.g. `voted` or `promoted`.
    pub outcome: &'static str,
    /// The affected record, when one still exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Ack<T> {
    const fn new(outcome: &'static str, data: Option<T>) -> Self {
        Self {
            status: "success",
            outcome,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Propose a phrase as a new candidate.
pub async fn submit_candidate(
    State(state): State<Arc<AppState>>,
    Participant(participant): Participant,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<Ack<Candidate>>, ApiError> {
    let Json(request) = body?;
    debug!(%participant, "submit_candidate");
    let candidate = state
        .engine
        .submit_candidate(&participant, &request.phrase)
        .await?;
    Ok(Json(Ack::new("submitted", Some(candidate))))
}

/// Toggle the caller's vote on a candidate.
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Participant(participant): Participant,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<Ack<Candidate>>, ApiError> {
    let Json(request) = body?;
    let id = CandidateId::from(request.candidate_id.parse("candidate_id")?);
    debug!(%participant, candidate_id = %id, "vote");
    let ack = match state.engine.vote(&participant, id).await? {
        VoteOutcome::Voted(candidate) => Ack::new("voted", Some(candidate)),
        VoteOutcome::Unvoted(candidate) => Ack::new("unvoted", Some(candidate)),
        VoteOutcome::Promoted { candidate, .. } => Ack::new("promoted", Some(candidate)),
        VoteOutcome::AlreadyPromoted(_) => Ack::new("already_promoted", None),
    };
    Ok(Json(ack))
}

/// Toggle the caller's flag on a story word.
pub async fn flag_word(
    State(state): State<Arc<AppState>>,
    Participant(participant): Participant,
    body: Result<Json<FlagRequest>, JsonRejection>,
) -> Result<Json<Ack<StoryWord>>, ApiError> {
    let Json(request) = body?;
    let id = WordId::from(request.word_id.parse("word_id")?);
    debug!(%participant, word_id = %id, "flag_word");
    let ack = match state.engine.flag_word(&participant, id).await? {
        FlagOutcome::Flagged(word) => Ack::new("flagged", Some(word)),
        FlagOutcome::Unflagged(word) => Ack::new("unflagged", Some(word)),
        FlagOutcome::Removed(_) => Ack::new("removed", None),
        FlagOutcome::AlreadyRemoved(_) => Ack::new("already_removed", None),
    };
    Ok(Json(ack))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Return the current game snapshot.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameSnapshot>, ApiError> {
    Ok(Json(state.engine.snapshot().await?))
}

/// Serve a minimal HTML page showing the game status and API routes.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.engine.snapshot().await?;
    let status = snapshot.phase.status;
    let story: Vec<&str> = snapshot.story.iter().map(|w| w.text.as_str()).collect();
    let story = if story.is_empty() {
        "(empty)".to_owned()
    } else {
        escape(&story.join(" "))
    };
    let candidates = snapshot.candidates.len();
    let users = snapshot.connected_users.len();
    let until = snapshot
        .phase
        .end_time
        .filter(|_| snapshot.phase.is_in_play())
        .or(snapshot.phase.next_start_time)
        .map_or_else(|| "-".to_owned(), |t| t.to_rfc3339());

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Zibbit!</title>
    <style>
        body {{ background: #101418; color: #d0d7de; font-family: monospace; padding: 2rem; max-width: 760px; margin: 0 auto; }}
        h1 {{ color: #f0883e; margin-bottom: 0.25rem; }}
        .metric {{ display: inline-block; border: 1px solid #30363d; border-radius: 6px; padding: 0.8rem 1.2rem; margin: 0.4rem 0.4rem 0.4rem 0; }}
        .label {{ color: #8b949e; font-size: 0.85rem; }}
        .value {{ color: #f0883e; font-size: 1.3rem; font-weight: bold; }}
        blockquote {{ border-left: 3px solid #f0883e; margin: 1rem 0; padding-left: 1rem; }}
        li {{ padding: 0.2rem 0; }}
    </style>
</head>
<body>
    <h1>Zibbit!</h1>
    <p>The consensus-based story game.</p>
    <div>
        <div class="metric"><div class="label">Status</div><div class="value">{status}</div></div>
        <div class="metric"><div class="label">Until</div><div class="value">{until}</div></div>
        <div class="metric"><div class="label">Candidates</div><div class="value">{candidates}</div></div>
        <div class="metric"><div class="label">Players</div><div class="value">{users}</div></div>
    </div>
    <blockquote>{story}</blockquote>
    <ul>
        <li>GET <a href="/events">/events</a> (server-sent events)</li>
        <li>GET <a href="/api/state">/api/state</a></li>
        <li>POST /submit_candidate</li>
        <li>POST /vote</li>
        <li>POST /flag_word</li>
    </ul>
</body>
</html>"#
    )))
}

/// Escape text for inclusion in HTML.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
