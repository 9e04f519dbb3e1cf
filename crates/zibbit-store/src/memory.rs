//! In-memory [`GameStore`] with the same atomic semantics as `Dragonfly`.
//!
//! Every operation runs under one lock, so each call is atomic just like a
//! single Redis command. Expiry is measured on [`tokio::time::Instant`],
//! which lets tests drive decay with a paused clock. Expired keys are
//! evicted lazily on access, which is indistinguishable from active
//! eviction to a caller.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::{GameStore, KeyTtl, TopicMessage};

/// Capacity of the pub/sub fan-out channel.
const TOPIC_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Value {
    Text(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    const fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local store for tests and single-node runs.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    events: broadcast::Sender<TopicMessage>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(TOPIC_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop `key` if its TTL has passed.
fn evict_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

fn deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    now.checked_add(ttl)
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_owned())
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entry = Entry::new(Value::Text(value.to_owned()));
        entry.expires_at = ttl.and_then(|t| deadline(now, t));
        self.entries.lock().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, now);
        if entries.contains_key(key) {
            return Ok(false);
        }
        let mut entry = Entry::new(Value::Text(value.to_owned()));
        entry.expires_at = deadline(now, ttl);
        entries.insert(key.to_owned(), entry);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        Ok(entries.remove(key).is_some())
    }

    async fn increment_by(&self, key: &str, amount: u64) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        let entry = entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::new(Value::Text(String::from("0"))));
        let Value::Text(current) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let parsed = current
            .parse::<u64>()
            .map_err(|e| StoreError::OutOfRange(format!("{key} is not a counter: {e}")))?;
        let next = parsed
            .checked_add(amount)
            .ok_or_else(|| StoreError::OutOfRange(format!("{key} would overflow")))?;
        *current = next.to_string();
        Ok(next)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, now);
        Ok(match entries.get(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, now);
        Ok(entries.get_mut(key).is_some_and(|entry| {
            entry.expires_at = deadline(now, ttl);
            true
        }))
    }

    async fn list_push(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        let entry = entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::new(Value::List(Vec::new())));
        let Value::List(list) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        list.extend_from_slice(values);
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        let Some(entry) = entries.get_mut(key) else {
            return Ok(0);
        };
        let Value::List(list) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let before = list.len();
        list.retain(|v| v != value);
        let removed = before.saturating_sub(list.len());
        if list.is_empty() {
            entries.remove(key);
        }
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        let entry = entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
        let Value::Set(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        Ok(set.insert(member.to_owned()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        let Some(entry) = entries.get_mut(key) else {
            return Ok(false);
        };
        let Value::Set(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let removed = set.remove(member);
        if set.is_empty() {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        evict_expired(&mut entries, key, Instant::now());
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        // send only fails when nobody is subscribed, which is not an error.
        let _ = self.events.send(TopicMessage {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TopicMessage> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("candidate:1", "x", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("candidate:1").await.unwrap().as_deref(), Some("x"));
        assert_eq!(
            store.ttl("candidate:1").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(1))
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("candidate:1").await.unwrap(), None);
        assert_eq!(store.ttl("candidate:1").await.unwrap(), KeyTtl::Missing);
        assert!(!store.delete("candidate:1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_extends_a_live_key_only() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(store.expire("k", Duration::from_secs(5)).await.unwrap());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("k").await.unwrap().is_some());
        assert!(!store.expire("missing", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_blocks_until_expiry() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(20);
        assert!(store.set_if_absent("cooldown:hi", "1", ttl).await.unwrap());
        assert!(!store.set_if_absent("cooldown:hi", "2", ttl).await.unwrap());
        tokio::time::advance(ttl).await;
        assert!(store.set_if_absent("cooldown:hi", "3", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_deletes_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.set("claim", "x", None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.delete("claim").await }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn counters_start_at_zero_and_restart_after_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.increment_by("ids:word", 1).await.unwrap(), 1);
        assert_eq!(store.increment_by("ids:word", 3).await.unwrap(), 4);
        assert!(store.delete("ids:word").await.unwrap());
        assert_eq!(store.increment_by("ids:word", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_remove_splices_and_keeps_order() {
        let store = MemoryStore::new();
        let words: Vec<String> = ["1", "2", "3"].iter().map(|s| (*s).to_owned()).collect();
        store.list_push("story:words", &words).await.unwrap();
        assert_eq!(store.list_remove("story:words", "2").await.unwrap(), 1);
        assert_eq!(
            store.list_range("story:words").await.unwrap(),
            vec!["1".to_owned(), "3".to_owned()]
        );
    }

    #[tokio::test]
    async fn emptied_sets_disappear() {
        let store = MemoryStore::new();
        assert!(store.set_add("voters", "a").await.unwrap());
        assert!(!store.set_add("voters", "a").await.unwrap());
        assert_eq!(store.set_members("voters").await.unwrap(), vec!["a".to_owned()]);
        assert!(store.set_remove("voters", "a").await.unwrap());
        assert!(!store.set_remove("voters", "a").await.unwrap());
        assert_eq!(store.ttl("voters").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let store = MemoryStore::new();
        store.set("word:1", "{}", None).await.unwrap();
        assert!(matches!(
            store.set_add("word:1", "a").await,
            Err(StoreError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn published_messages_reach_subscribers() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store
            .publish("game_events:story_update", "{\"story\":[]}")
            .await
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "game_events:story_update");
        assert_eq!(msg.payload, "{\"story\":[]}");
    }
}
