//! Monotonic id allocation backed by store counters.
//!
//! Ids start at 1 each game and are never reused within a game. A phrase
//! of `n` words reserves its whole block with one `INCRBY n`, so the
//! words of a single promotion always get contiguous ids.

use std::sync::Arc;

use zibbit_store::{GameStore, StoreError};
use zibbit_types::{CandidateId, WordId};

use crate::keys;

/// Allocates candidate and word ids.
#[derive(Clone)]
pub struct IdAllocator {
    store: Arc<dyn GameStore>,
}

impl IdAllocator {
    /// Create an allocator over the given store.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Allocate the next candidate id.
    pub async fn next_candidate_id(&self) -> Result<CandidateId, StoreError> {
        let id = self.store.increment_by(keys::CANDIDATE_IDS, 1).await?;
        Ok(CandidateId::from(id))
    }

    /// Reserve `count` contiguous word ids, in order.
    ///
    /// Returns an empty block for `count == 0` without touching the store.
    pub async fn allocate_word_ids(&self, count: u64) -> Result<Vec<WordId>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let last = self.store.increment_by(keys::WORD_IDS, count).await?;
        let first = last
            .checked_sub(count)
            .and_then(|base| base.checked_add(1))
            .ok_or_else(|| {
                StoreError::OutOfRange(format!("word counter {last} is below block size {count}"))
            })?;
        Ok((first..=last).map(WordId::from).collect())
    }

    /// Restart both counters at zero for a new game.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.store.delete(keys::CANDIDATE_IDS).await?;
        self.store.delete(keys::WORD_IDS).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use zibbit_store::MemoryStore;

    use super::*;

    fn allocator() -> IdAllocator {
        IdAllocator::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn candidate_ids_start_at_one_and_increase() {
        let ids = allocator();
        assert_eq!(ids.next_candidate_id().await.unwrap(), CandidateId::from(1));
        assert_eq!(ids.next_candidate_id().await.unwrap(), CandidateId::from(2));
    }

    #[tokio::test]
    async fn word_blocks_are_contiguous() {
        let ids = allocator();
        let first = ids.allocate_word_ids(3).await.unwrap();
        let second = ids.allocate_word_ids(2).await.unwrap();
        assert_eq!(first, vec![WordId::from(1), WordId::from(2), WordId::from(3)]);
        assert_eq!(second, vec![WordId::from(4), WordId::from(5)]);
        assert!(ids.allocate_word_ids(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_blocks_never_overlap() {
        let ids = allocator();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let ids = ids.clone();
            handles.push(tokio::spawn(async move { ids.allocate_word_ids(3).await.unwrap() }));
        }
        let mut all = Vec::new();
        for handle in handles {
            let block = handle.await.unwrap();
            let raw: Vec<u64> = block.iter().map(|w| w.into_inner()).collect();
            assert!(raw.windows(2).all(|pair| pair.first().map(|a| a + 1) == pair.get(1).copied()));
            all.extend(raw);
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 30);
    }

    #[tokio::test]
    async fn reset_restarts_at_one() {
        let ids = allocator();
        ids.allocate_word_ids(4).await.unwrap();
        ids.next_candidate_id().await.unwrap();
        ids.reset().await.unwrap();
        assert_eq!(ids.next_candidate_id().await.unwrap(), CandidateId::from(1));
        assert_eq!(ids.allocate_word_ids(1).await.unwrap(), vec![WordId::from(1)]);
    }
}
