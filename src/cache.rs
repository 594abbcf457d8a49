//! Bounded memo of resolved schemas.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde_json::Value;

use crate::types::Principal;

/// Default number of resolved schemas kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Identifies one resolution result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: String,
    pub with_refs: bool,
    pub resolved: bool,
    pub principal: Principal,
}

impl CacheKey {
    pub fn new(path: impl Into<String>, with_refs: bool, resolved: bool, principal: Principal) -> Self {
        Self {
            path: path.into(),
            with_refs,
            resolved,
            principal,
        }
    }
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Concurrent least-recently-used cache of resolved schemas.
///
/// There is no invalidation: documents are treated as immutable for the
/// life of the process and entries leave only through eviction. Concurrent
/// misses for the same key may both compute and both insert; the last
/// insert wins.
#[derive(Debug)]
pub struct ResolutionCache {
    entries: Mutex<LruCache<CacheKey, Arc<Value>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero falls back to [`DEFAULT_CACHE_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a key, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        let found = self.lock().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert a value, evicting the least recently used entry when full.
    pub fn put(&self, key: CacheKey, value: Arc<Value>) {
        if let Some((displaced, _)) = self.lock().push(key, value) {
            tracing::trace!(path = %displaced.path, "displaced cached schema");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    // Every LruCache operation leaves it consistent; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<Value>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
