//! Typed game events over the store's pub/sub, plus presence tracking.
//!
//! Every state change is announced on the topic `game_events:{kind}` with
//! a flat JSON object payload carrying a `server_time` stamp. Delivery is
//! at-most-once with no replay; subscribers that miss events reconcile
//! from a fresh [`GameSnapshot`](zibbit_types::GameSnapshot).
//!
//! If a subscriber falls behind, lagged messages are skipped and it
//! resumes from the most recent event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use zibbit_store::{GameStore, StoreError, TopicMessage};
use zibbit_types::{EventKind, ParticipantId};

use crate::clock;
use crate::error::GameError;
use crate::keys;

/// Topic pattern a store subscription must cover to see every event.
pub const EVENT_TOPIC_PATTERN: &str = keys::EVENT_PATTERN;

/// One decoded event, as received by a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    /// Which event this is.
    pub kind: EventKind,
    /// Flat JSON object payload, including `server_time`.
    pub payload: Value,
}

/// Publishes typed events and tracks connected participants.
#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<dyn GameStore>,
}

impl Broadcaster {
    /// Create a broadcaster over the given store.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Publish `payload` as a `kind` event, stamped with the current time.
    ///
    /// `payload` should serialize to a JSON object; anything else is
    /// wrapped as `{"data": ...}`.
    pub async fn publish<T: Serialize + Sync + ?Sized>(
        &self,
        kind: EventKind,
        payload: &T,
    ) -> Result<(), GameError> {
        let body = stamp(serde_json::to_value(payload)?, clock::now());
        let text = serde_json::to_string(&body)?;
        self.store.publish(&keys::topic(kind), &text).await?;
        debug!(event = %kind, "Published game event");
        Ok(())
    }

    /// Publish after a mutation has already committed.
    ///
    /// The state change stands regardless, so a failed announcement is
    /// logged rather than reported to the caller.
    pub async fn announce<T: Serialize + Sync + ?Sized>(&self, kind: EventKind, payload: &T) {
        if let Err(e) = self.publish(kind, payload).await {
            warn!(event = %kind, error = %e, "Failed to publish game event");
        }
    }

    /// Mark a participant as connected and announce the new list.
    pub async fn register(&self, participant: &ParticipantId) -> Result<(), GameError> {
        self.store
            .set_add(keys::CONNECTED_USERS, participant.as_str())
            .await?;
        debug!(%participant, "Participant connected");
        self.announce_connections().await;
        Ok(())
    }

    /// Remove a participant from the connected set and announce the new list.
    ///
    /// Runs on stream teardown, where nobody is left to receive an error,
    /// so failures are logged and swallowed.
    pub async fn deregister(&self, participant: &ParticipantId) {
        match self
            .store
            .set_remove(keys::CONNECTED_USERS, participant.as_str())
            .await
        {
            Ok(_) => {
                debug!(%participant, "Participant disconnected");
                self.announce_connections().await;
            }
            Err(e) => warn!(%participant, error = %e, "Failed to deregister participant"),
        }
    }

    /// Currently connected participants, sorted.
    pub async fn connected_users(&self) -> Result<Vec<ParticipantId>, StoreError> {
        let mut users: Vec<ParticipantId> = self
            .store
            .set_members(keys::CONNECTED_USERS)
            .await?
            .into_iter()
            .map(ParticipantId::from)
            .collect();
        users.sort();
        Ok(users)
    }

    /// Start receiving every event published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.store.subscribe(),
        }
    }

    async fn announce_connections(&self) {
        match self.connected_users().await {
            Ok(users) => {
                let payload = serde_json::json!({
                    "count": users.len(),
                    "connected_users": users,
                });
                self.announce(EventKind::UserConnections, &payload).await;
            }
            Err(e) => warn!(error = %e, "Failed to read connected participants"),
        }
    }
}

/// A live feed of decoded [`GameEvent`]s.
pub struct EventSubscription {
    rx: broadcast::Receiver<TopicMessage>,
}

impl EventSubscription {
    /// Wait for the next game event.
    ///
    /// Returns `None` once the underlying subscription is closed.
    /// Messages on unrelated topics and undecodable payloads are skipped.
    pub async fn next(&mut self) -> Option<GameEvent> {
        loop {
            match self.rx.recv().await {
                Ok(message) => {
                    if let Some(event) = decode(&message) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event subscriber lagged, skipping ahead");
                }
                Err(RecvError::Closed) => {
                    debug!("Event channel closed");
                    return None;
                }
            }
        }
    }
}

fn decode(message: &TopicMessage) -> Option<GameEvent> {
    let name = message.topic.strip_prefix(keys::EVENT_PREFIX)?;
    let Some(kind) = EventKind::from_name(name) else {
        debug!(topic = %message.topic, "Ignoring unknown event topic");
        return None;
    };
    match serde_json::from_str(&message.payload) {
        Ok(payload) => Some(GameEvent { kind, payload }),
        Err(e) => {
            warn!(topic = %message.topic, error = %e, "Dropping undecodable event payload");
            None
        }
    }
}

/// Merge `server_time` for `at` into a payload object.
///
/// Non-object payloads are wrapped as `{"data": payload}` first.
pub fn stamp(payload: Value, at: DateTime<Utc>) -> Value {
    let mut object = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_owned(), other);
            map
        }
    };
    object.insert("server_time".to_owned(), Value::from(clock::server_time(at)));
    Value::Object(object)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use zibbit_store::MemoryStore;

    use super::*;
    use crate::testing::FaultyStore;

    fn broadcaster() -> (Arc<MemoryStore>, Broadcaster) {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Broadcaster::new(store.clone());
        (store, broadcaster)
    }

    async fn next_event(sub: &mut EventSubscription) -> GameEvent {
        tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn stamp_adds_server_time_to_objects() {
        let stamped = stamp(json!({"story": []}), clock::now());
        assert!(stamped["story"].is_array());
        assert!(stamped["server_time"].is_f64());
    }

    #[test]
    fn stamp_wraps_non_objects() {
        let stamped = stamp(json!([1, 2]), clock::now());
        assert_eq!(stamped["data"], json!([1, 2]));
        assert!(stamped["server_time"].is_f64());
    }

    #[tokio::test]
    async fn published_events_reach_subscribers_decoded() {
        let (_store, broadcaster) = broadcaster();
        let mut sub = broadcaster.subscribe();

        broadcaster
            .publish(EventKind::StoryUpdate, &json!({"story": []}))
            .await
            .unwrap();

        let event = next_event(&mut sub).await;
        assert_eq!(event.kind, EventKind::StoryUpdate);
        assert_eq!(event.payload["story"], json!([]));
        assert!(event.payload["server_time"].is_f64());
    }

    #[tokio::test]
    async fn foreign_topics_are_skipped() {
        let (store, broadcaster) = broadcaster();
        let mut sub = broadcaster.subscribe();

        store.publish("game_events:nonsense", "{}").await.unwrap();
        store.publish("other:story_update", "{}").await.unwrap();
        store.publish("game_events:word_flag", "not json").await.unwrap();
        broadcaster
            .publish(EventKind::GameEnd, &json!({"game_status": "COOLDOWN"}))
            .await
            .unwrap();

        assert_eq!(next_event(&mut sub).await.kind, EventKind::GameEnd);
    }

    #[tokio::test]
    async fn presence_is_tracked_and_announced() {
        let (_store, broadcaster) = broadcaster();
        let mut sub = broadcaster.subscribe();
        let alice = ParticipantId::new("10.0.0.1");
        let bob = ParticipantId::new("10.0.0.2");

        broadcaster.register(&bob).await.unwrap();
        broadcaster.register(&alice).await.unwrap();
        assert_eq!(
            broadcaster.connected_users().await.unwrap(),
            vec![alice.clone(), bob.clone()]
        );

        let first = next_event(&mut sub).await;
        assert_eq!(first.kind, EventKind::UserConnections);
        assert_eq!(first.payload["count"], 1);
        let second = next_event(&mut sub).await;
        assert_eq!(second.payload["count"], 2);

        broadcaster.deregister(&alice).await;
        let third = next_event(&mut sub).await;
        assert_eq!(third.payload["connected_users"], json!(["10.0.0.2"]));
        assert_eq!(broadcaster.connected_users().await.unwrap(), vec![bob]);
    }

    #[tokio::test]
    async fn deregistering_twice_is_harmless() {
        let (_store, broadcaster) = broadcaster();
        let carol = ParticipantId::new("10.0.0.3");
        broadcaster.register(&carol).await.unwrap();
        let mut sub = broadcaster.subscribe();

        broadcaster.deregister(&carol).await;
        broadcaster.deregister(&carol).await;

        assert!(broadcaster.connected_users().await.unwrap().is_empty());
        for _ in 0..2 {
            let event = next_event(&mut sub).await;
            assert_eq!(event.kind, EventKind::UserConnections);
            assert_eq!(event.payload["count"], 0);
        }
    }

    #[tokio::test]
    async fn deregister_swallows_store_failures() {
        let faulty = Arc::new(FaultyStore::default());
        let broadcaster = Broadcaster::new(faulty.clone());
        let dave = ParticipantId::new("10.0.0.4");
        broadcaster.register(&dave).await.unwrap();

        faulty.fail_on(keys::CONNECTED_USERS);
        broadcaster.deregister(&dave).await;
        faulty.heal();

        assert_eq!(broadcaster.connected_users().await.unwrap(), vec![dave.clone()]);
        broadcaster.deregister(&dave).await;
        assert!(broadcaster.connected_users().await.unwrap().is_empty());
    }
}
