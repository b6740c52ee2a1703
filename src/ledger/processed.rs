//! Bounded set of already-credited transaction hashes.
//!
//! Backed by an LRU cache with a fixed capacity, so memory stays bounded no
//! matter how long the process runs; the oldest hashes age out first. The set
//! is process-local and best-effort across instances.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use alloy::primitives::B256;
use lru::LruCache;

const DEFAULT_CAPACITY: usize = 10_000;

pub struct ProcessedSet {
    inner: Mutex<LruCache<B256, ()>>,
}

impl Default for ProcessedSet {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ProcessedSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Record a hash. Returns `true` the first time a hash is seen and
    /// `false` on replay.
    pub fn mark(&self, tx_hash: B256) -> bool {
        let mut cache = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.put(tx_hash, ()).is_none()
    }

    pub fn contains(&self, tx_hash: B256) -> bool {
        let cache = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.contains(&tx_hash)
    }
}
