//! Error types for the game API server.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Game
//! errors map by [`ErrorKind`]:
//!
//! | Kind | Status |
//! |------|--------|
//! | validation | 400 |
//! | not found | 404 |
//! | conflict | 409 |
//! | transient store | 503 |

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use zibbit_core::{ErrorKind, GameError};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A game operation failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The request could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A response could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// HTTP status and wire kind for this error.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Game(e) => {
                let kind = e.kind();
                let status = match kind {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::TransientStore => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, kind.as_str())
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::Validation.as_str()),
            Self::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": kind,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use zibbit_types::CandidateId;

    use super::*;

    #[test]
    fn game_errors_map_to_statuses() {
        let cases = [
            (GameError::EmptyPhrase, StatusCode::BAD_REQUEST),
            (
                GameError::NoSuchCandidate(CandidateId::from(1)),
                StatusCode::NOT_FOUND,
            ),
            (GameError::NotInPlay, StatusCode::CONFLICT),
            (
                GameError::Store(zibbit_store::StoreError::WrongType("k".to_owned())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }
}
