//! In-memory response cache shared by every fetcher.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A cached response with its fetch time.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    /// Monotonic fetch time used for freshness.
    pub fetched_at: Instant,
    /// Wall-clock fetch time for display.
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        Instant::now().duration_since(self.fetched_at)
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("fetched_at", &self.fetched_at)
            .field("cached_at", &self.cached_at)
            .finish_non_exhaustive()
    }
}

/// Issued when a fetch starts. A ticket may write only while no value
/// from a newer ticket has been stored for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FetchTicket(u64);

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Last ticket issued per key.
    generations: HashMap<String, u64>,
    /// Ticket of the value currently stored per key.
    written: HashMap<String, u64>,
}

/// Key to value map with per-read TTL checks.
///
/// Entries are never evicted on their own: they are replaced by newer
/// fetches and removed only by [`ResponseCache::invalidate`] or
/// [`ResponseCache::clear`]. Clones share the same map.
#[derive(Clone, Default)]
pub struct ResponseCache {
    state: Arc<RwLock<CacheState>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key` if it is younger than `ttl` and of type `T`.
    pub fn get_fresh<T: Send + Sync + 'static>(&self, key: &str, ttl: Duration) -> Option<Arc<T>> {
        let entry = self.read().entries.get(key).cloned()?;

        if !entry.is_fresh(ttl) {
            trace!("Cache entry for {} is stale ({:?} old)", key, entry.age());
            return None;
        }

        match entry.value.downcast::<T>() {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(_) => {
                debug!("Cache entry for {} holds a different type, ignoring", key);
                None
            }
        }
    }

    /// Store a value unconditionally, replacing any previous entry.
    ///
    /// Fetches already in flight for the key can no longer overwrite it.
    pub fn store<T: Send + Sync + 'static>(&self, key: &str, value: Arc<T>) {
        let mut state = self.write();
        let latest = state.generations.get(key).copied().unwrap_or(0);
        state.written.insert(key.to_string(), latest);
        state.entries.insert(key.to_string(), Self::entry(value));
    }

    /// Start a fetch for `key`, superseding every earlier ticket.
    pub(crate) fn begin_fetch(&self, key: &str) -> FetchTicket {
        let mut state = self.write();
        let generation = state.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        FetchTicket(*generation)
    }

    /// Store a fetched value unless a newer fetch's value is already stored.
    ///
    /// An older fetch may still fill the key while newer ones are pending or
    /// have failed. Returns false when the result was discarded.
    pub(crate) fn store_if_latest<T: Send + Sync + 'static>(
        &self,
        key: &str,
        ticket: FetchTicket,
        value: Arc<T>,
    ) -> bool {
        let mut state = self.write();
        let written = state.written.get(key).copied().unwrap_or(0);
        if ticket.0 <= written {
            debug!(
                "Discarding superseded result for {} (ticket {}, stored {})",
                key, ticket.0, written
            );
            return false;
        }
        state.written.insert(key.to_string(), ticket.0);
        state.entries.insert(key.to_string(), Self::entry(value));
        true
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.write().entries.remove(key).is_some();
        if removed {
            debug!("Invalidated cache entry {}", key);
        }
        removed
    }

    pub fn clear(&self) {
        self.write().entries.clear();
    }

    /// Age of the entry for `key`, fresh or not.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.read().entries.get(key).map(CacheEntry::age)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry<T: Send + Sync + 'static>(value: Arc<T>) -> CacheEntry {
        CacheEntry {
            value,
            fetched_at: Instant::now(),
            cached_at: Utc::now(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.len())
            .finish()
    }
}
