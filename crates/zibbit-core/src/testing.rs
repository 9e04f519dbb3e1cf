//! Test double: an in-memory store that can be told to fail.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use zibbit_store::{GameStore, KeyTtl, MemoryStore, StoreError, TopicMessage};

/// [`MemoryStore`] with two fault hooks: every command on one key can be
/// made to fail, and one key can be made to vanish right before its TTL
/// is read.
#[derive(Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    failing: Mutex<Option<String>>,
    vanish_before_ttl: Mutex<Option<String>>,
}

#[allow(clippy::unwrap_used)]
impl FaultyStore {
    /// Fail every command on `key` until [`FaultyStore::heal`].
    pub(crate) fn fail_on(&self, key: &str) {
        *self.failing.lock().unwrap() = Some(key.to_owned());
    }

    pub(crate) fn heal(&self) {
        *self.failing.lock().unwrap() = None;
    }

    /// Delete `key` the next time its TTL is read, as if it expired in
    /// between a caller's read and its TTL check.
    pub(crate) fn vanish_before_ttl(&self, key: &str) {
        *self.vanish_before_ttl.lock().unwrap() = Some(key.to_owned());
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().as_deref() == Some(key) {
            return Err(StoreError::Config("injected outage".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl GameStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn increment_by(&self, key: &str, amount: u64) -> Result<u64, StoreError> {
        self.check(key)?;
        self.inner.increment_by(key, amount).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        self.check(key)?;
        let vanish = {
            let mut armed = self.vanish_before_ttl.lock().unwrap();
            if armed.as_deref() == Some(key) {
                armed.take()
            } else {
                None
            }
        };
        if let Some(key) = vanish {
            self.inner.delete(&key).await?;
        }
        self.inner.ttl(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.expire(key, ttl).await
    }

    async fn list_push(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.list_push(key, values).await
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check(key)?;
        self.inner.list_range(key).await
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        self.check(key)?;
        self.inner.list_remove(key, value).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check(key)?;
        self.inner.set_members(key).await
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        self.check(topic)?;
        self.inner.publish(topic, payload).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TopicMessage> {
        self.inner.subscribe()
    }
}
