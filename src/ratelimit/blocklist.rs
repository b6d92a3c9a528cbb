//! Block table: identities currently refused, with the instant they unblock.
//!
//! The table is split into shards, each behind its own async mutex. A key
//! always maps to the same shard, so holding a shard's guard serializes every
//! decision for the keys in it. With a single shard every decision in the
//! process is serialized.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// One shard of the block table: lookup key to unblock instant.
pub type BlockShard = HashMap<String, Instant>;

/// Sharded map of blocked keys.
pub struct BlockTable {
    shards: Box<[Mutex<BlockShard>]>,
    hasher: RandomState,
}

impl BlockTable {
    /// Create a table with `shards` independent locks (at least one).
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Lock the shard owning `key`.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, BlockShard> {
        self.shards[self.shard_index(key)].lock().await
    }

    /// Whether `key` has a block entry that has not yet lapsed.
    pub async fn is_blocked(&self, key: &str) -> bool {
        let shard = self.lock(key).await;
        shard.get(key).is_some_and(|unblock_at| Instant::now() < *unblock_at)
    }

    /// Total number of block entries, including lapsed ones not yet cleared.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in self.shards.iter() {
            total += shard.lock().await.len();
        }
        total
    }

    fn shard_index(&self, key: &str) -> usize {
        if self.shards.len() == 1 {
            return 0;
        }
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }
}

impl std::fmt::Debug for BlockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockTable")
            .field("shards", &self.shards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_shards_becomes_one() {
        assert_eq!(BlockTable::new(0).shard_count(), 1);
        assert_eq!(BlockTable::new(16).shard_count(), 16);
    }

    #[test]
    fn test_key_maps_to_stable_shard() {
        let table = BlockTable::new(16);
        let first = table.shard_index("token:abc");
        for _ in 0..10 {
            assert_eq!(table.shard_index("token:abc"), first);
        }
        assert!(first < 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_blocked_respects_unblock_instant() {
        let table = BlockTable::new(4);
        table
            .lock("ip:1.2.3.4")
            .await
            .insert("ip:1.2.3.4".to_string(), Instant::now() + Duration::from_secs(5));

        assert!(table.is_blocked("ip:1.2.3.4").await);
        assert!(!table.is_blocked("ip:5.6.7.8").await);
        assert_eq!(table.len().await, 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!table.is_blocked("ip:1.2.3.4").await);
        // Lapsed entries stay until a decision clears them.
        assert_eq!(table.len().await, 1);
    }
}
