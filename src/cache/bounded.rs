//! Capacity-bounded map with a selectable eviction policy
//!
//! Both policies sit on one `LruCache`. Under `InsertionOrder` reads use
//! `peek` and replacements use `peek_mut`, so recency order stays equal to
//! insertion order.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Which entry goes when a full cache receives a new key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the oldest-inserted entry. Reads never promote, so a hot
    /// entry is evicted as readily as a cold one.
    #[default]
    InsertionOrder,
    /// Evict the least recently read or written entry
    Lru,
}

/// Bounded key/value cache
///
/// Not synchronized; wrap it in a lock to share it.
pub struct BoundedCache<K, V> {
    entries: LruCache<K, V>,
    policy: EvictionPolicy,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (0 is treated as 1).
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Look up `key`. Under `Lru` this marks the entry as most recent.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.policy {
            EvictionPolicy::InsertionOrder => self.entries.peek(key).cloned(),
            EvictionPolicy::Lru => self.entries.get(key).cloned(),
        }
    }

    /// Insert `value` under `key`, returning the key evicted to make room.
    ///
    /// Replacing an existing key never evicts. Under `InsertionOrder` the
    /// replaced entry keeps its original position.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        match self.policy {
            EvictionPolicy::InsertionOrder => {
                if let Some(existing) = self.entries.peek_mut(&key) {
                    *existing = value;
                    return None;
                }
            }
            EvictionPolicy::Lru => {
                if self.entries.contains(&key) {
                    self.entries.put(key, value);
                    return None;
                }
            }
        }
        self.entries.push(key, value).map(|(evicted, _)| evicted)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
