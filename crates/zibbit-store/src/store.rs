//! The store capability contract consumed by the game engine.
//!
//! Every method is a single atomic store operation. The engine never
//! holds in-process locks around these calls; anything that needs
//! cross-client coordination is resolved by one atomic reply, e.g.
//! [`GameStore::delete`] returning `true` to exactly one caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// Remaining lifetime of a key, as reported by [`GameStore::ttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (never set, deleted, or expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// The remaining lifetime, if the key exists and expires.
    pub const fn remaining(self) -> Option<Duration> {
        match self {
            Self::Expires(d) => Some(d),
            Self::Missing | Self::Persistent => None,
        }
    }
}

/// A message received from a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Full topic name, e.g. `game_events:story_update`.
    pub topic: String,
    /// Raw payload as published.
    pub payload: String,
}

/// Keyed storage with TTL, atomic counters, lists, sets, and pub/sub.
///
/// Implementations must be safe to call from any number of tasks at once.
/// Semantics follow Redis: missing counters start at zero, emptied lists
/// and sets disappear, and a TTL applies to the whole key.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a string value, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Write a string value with a TTL only if the key does not exist.
    ///
    /// Returns `true` if this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Delete a key of any type.
    ///
    /// Returns `true` only to the caller whose delete removed a live key,
    /// which makes this the exactly-once claim primitive.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically add `amount` to a counter and return the new value.
    async fn increment_by(&self, key: &str, amount: u64) -> Result<u64, StoreError>;

    /// Remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// Set the remaining lifetime of an existing key.
    ///
    /// Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Append values to the end of a list.
    async fn list_push(&self, key: &str, values: &[String]) -> Result<(), StoreError>;

    /// Read a whole list in order.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Remove every occurrence of `value` from a list, keeping the order of
    /// the rest. Returns the number removed.
    async fn list_remove(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Add a member to a set. Returns `true` if it was not already present.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Remove a member from a set. Returns `true` if it was present.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// All members of a set, in no particular order.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Publish a payload to a topic. Delivery is at-most-once, no replay.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError>;

    /// Receive every message published to the subscribed topic pattern
    /// from now on.
    fn subscribe(&self) -> broadcast::Receiver<TopicMessage>;
}

/// Serialize `value` as JSON and store it at `key`.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if serialization fails, or the
/// store's error if the write fails.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn GameStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json, ttl).await
}

/// Read the value at `key` and deserialize it from JSON.
///
/// Returns `Ok(None)` if the key does not exist.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if deserialization fails, or the
/// store's error if the read fails.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn GameStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}
