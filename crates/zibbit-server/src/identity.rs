//! Best-effort participant identity.
//!
//! There are no accounts. A participant is whoever sends the request:
//! the first entry of `X-Forwarded-For` when behind a proxy, otherwise the
//! peer IP address. Nothing here is authenticated.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use zibbit_types::ParticipantId;

use crate::error::ApiError;

/// Header set by reverse proxies carrying the original client address.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Extractor for the requesting participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant(pub ParticipantId);

impl<S: Send + Sync> FromRequestParts<S> for Participant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        resolve(&parts.headers, peer)
            .map(Self)
            .ok_or_else(|| ApiError::BadRequest("cannot identify participant".to_owned()))
    }
}

/// Pick the participant token from the forwarding header or the peer.
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<ParticipantId> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());
    match forwarded {
        Some(first) => Some(ParticipantId::new(first)),
        None => peer.map(|addr| ParticipantId::new(addr.ip().to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.7:51234".parse().unwrap())
    }

    #[test]
    fn first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"),
        );
        assert_eq!(
            resolve(&headers, peer()),
            Some(ParticipantId::new("203.0.113.5"))
        );
    }

    #[test]
    fn peer_ip_without_port_is_the_fallback() {
        assert_eq!(
            resolve(&HeaderMap::new(), peer()),
            Some(ParticipantId::new("192.0.2.7"))
        );
    }

    #[test]
    fn empty_header_falls_back_and_nothing_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(""));
        assert_eq!(resolve(&headers, None), None);
    }
}
