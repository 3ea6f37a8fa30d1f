//! Bounded LRU + TTL cache for completed reports.
//!
//! Entries are evicted either by LRU order when the size bound is reached or
//! by age once they are older than `max_age`, whichever triggers first. All
//! operations take a single internal lock, so the cache can be shared between
//! the job submitter and background jobs without external synchronization.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use super::clock::{Clock, SystemClock};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU order (front = oldest, back = newest)
    lru_order: VecDeque<K>,
}

impl<K: Hash + Eq + Clone, V> CacheState<K, V> {
    /// Move a key to the back of the LRU queue (most recently used)
    fn touch(&mut self, key: &K) {
        self.lru_order.retain(|k| k != key);
        self.lru_order.push_back(key.clone());
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        self.lru_order.retain(|k| k != key);
        self.entries.remove(key)
    }
}

/// Thread-safe cache with a size bound and a time-to-live.
pub struct BoundedCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    max_size: usize,
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_size` entries for at most `max_age`.
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self::with_clock(max_size, max_age, Arc::new(SystemClock))
    }

    /// Create a cache with a custom clock (for tests).
    pub fn with_clock(max_size: usize, max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                lru_order: VecDeque::new(),
            }),
            max_size: max_size.max(1),
            max_age,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_expired(&self, inserted_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(inserted_at) > self.max_age
    }

    /// Insert or overwrite `key`, stamping it with the current time.
    ///
    /// Expired entries are purged first; if the cache is still full the least
    /// recently used entry is evicted.
    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut state = self.lock();

        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry.inserted_at, now))
            .map(|(k, _)| k.clone())
            .collect();
        if !expired.is_empty() {
            debug!(count = expired.len(), "purging expired cache entries");
        }
        for key in &expired {
            state.remove(key);
        }

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.max_size {
                match state.lru_order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                        debug!("evicted least recently used cache entry");
                    }
                    None => break,
                }
            }
        }

        state.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
        state.touch(&key);
    }

    /// Look up `key`, marking it most recently used.
    ///
    /// Returns `None` for missing or expired keys; expired entries are dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.lock();

        let inserted_at = state.entries.get(key)?.inserted_at;
        if self.is_expired(inserted_at, now) {
            state.remove(key);
            return None;
        }

        state.touch(key);
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Remove `key`, returning its value if it was present and fresh.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.lock();
        state
            .remove(key)
            .filter(|entry| !self.is_expired(entry.inserted_at, now))
            .map(|entry| entry.value)
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}
