//! # Byte-Bounded LRU Store
//!
//! The local store of a cache group: a key/value container bounded by the
//! total number of bytes it holds, evicting least recently used entries
//! first.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────────┐
//!   │                       ConcurrentLruCache<V>                              │
//!   │                                                                          │
//!   │   ┌────────────────────────────────────────────────────────────────────┐ │
//!   │   │        Mutex<Lazy<V>>   (core built on first use)                  │ │
//!   │   └────────────────────────────────────────────────────────────────────┘ │
//!   │                                  │                                       │
//!   │                                  ▼                                       │
//!   │   ┌────────────────────────────────────────────────────────────────────┐ │
//!   │   │                          LruCore<V>                                │ │
//!   │   │                                                                    │ │
//!   │   │   index: FxHashMap<String, SlotId>                                 │ │
//!   │   │                                                                    │ │
//!   │   │   order: IntrusiveList<Entry<V>>                                   │ │
//!   │   │     head ──► [k3,v3] ◄──► [k1,v1] ◄──► [k2,v2] ◄── tail            │ │
//!   │   │              (MRU)                     (LRU, evicted first)        │ │
//!   │   │                                                                    │ │
//!   │   │   used_bytes = Σ key.len() + value.weight()                        │ │
//!   │   └────────────────────────────────────────────────────────────────────┘ │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Method            | Effect                                                  |
//! |-------------------|---------------------------------------------------------|
//! | `get(key)`        | Returns the value and promotes it to MRU                |
//! | `peek(key)`       | Returns the value without touching recency              |
//! | `add(key, value)` | Insert or replace, promote, then evict while over budget|
//! | `remove_oldest()` | Evicts the LRU entry; no-op when empty                  |
//! | `len()`           | Number of live entries                                  |
//!
//! A capacity of `0` means unbounded. An entry larger than the whole budget
//! is admitted and then immediately evicted.
//!
//! ## Eviction callback
//!
//! The optional callback receives the evicted key and value by value, after
//! the entry has left both the index and the recency list. Under
//! [`ConcurrentLruCache`] it runs while the store lock is held, so it must not
//! call back into the same store.
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::policy::lru::LruCore;
//!
//! // Budget for two entries of 1-byte key + 1-byte value.
//! let mut store: LruCore<String> = LruCore::new(4);
//! store.add("a", "1".to_string());
//! store.add("b", "2".to_string());
//! assert!(store.get("a").is_some());
//!
//! store.add("c", "3".to_string());
//! assert!(store.contains("a"));
//! assert!(!store.contains("b"));
//! assert_eq!(store.used_bytes(), 4);
//! ```

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::error::InvariantError;
use crate::traits::Weighted;

/// Callback invoked with every evicted entry.
pub type OnEvicted<V> = Box<dyn FnMut(String, V) + Send>;

#[derive(Debug)]
struct Entry<V> {
    key: String,
    value: V,
}

impl<V: Weighted> Entry<V> {
    fn size(&self) -> usize {
        self.key.len() + self.value.weight()
    }
}

/// Single-threaded byte-bounded LRU store.
pub struct LruCore<V> {
    index: FxHashMap<String, SlotId>,
    order: IntrusiveList<Entry<V>>,
    capacity_bytes: usize,
    used_bytes: usize,
    evictions: u64,
    on_evicted: Option<OnEvicted<V>>,
}

impl<V: Weighted> LruCore<V> {
    /// Creates an empty store holding at most `capacity_bytes` (0 = unbounded).
    pub fn new(capacity_bytes: usize) -> Self {
        Self::with_eviction_callback(capacity_bytes, None)
    }

    /// Creates an empty store that reports evictions to `on_evicted`.
    pub fn with_eviction_callback(capacity_bytes: usize, on_evicted: Option<OnEvicted<V>>) -> Self {
        Self {
            index: FxHashMap::default(),
            order: IntrusiveList::new(),
            capacity_bytes,
            used_bytes: 0,
            evictions: 0,
            on_evicted,
        }
    }

    /// Looks up `key` and promotes it to most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.order.move_to_front(id);
        self.order.get(id).map(|entry| &entry.value)
    }

    /// Looks up `key` without changing recency.
    pub fn peek(&self, key: &str) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.order.get(id).map(|entry| &entry.value)
    }

    /// Returns `true` if `key` is present, without touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts or replaces `key`, promotes it, then evicts until within budget.
    pub fn add(&mut self, key: &str, value: V) {
        match self.index.get(key).copied() {
            Some(id) => {
                self.order.move_to_front(id);
                if let Some(entry) = self.order.get_mut(id) {
                    let old_weight = entry.value.weight();
                    let new_weight = value.weight();
                    entry.value = value;
                    self.used_bytes = self.used_bytes - old_weight + new_weight;
                }
            },
            None => {
                let entry = Entry {
                    key: key.to_owned(),
                    value,
                };
                self.used_bytes += entry.size();
                let id = self.order.push_front(entry);
                self.index.insert(key.to_owned(), id);
            },
        }

        while self.capacity_bytes != 0 && self.used_bytes > self.capacity_bytes {
            if !self.remove_oldest() {
                break;
            }
        }
    }

    /// Evicts the least recently used entry; returns `false` if the store is empty.
    pub fn remove_oldest(&mut self) -> bool {
        let Some(entry) = self.order.pop_back() else {
            return false;
        };
        self.index.remove(&entry.key);
        self.used_bytes -= entry.size();
        self.evictions += 1;
        tracing::trace!(key = %entry.key, bytes = entry.size(), "evicted");
        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(entry.key, entry.value);
        }
        true
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of `key.len() + value.weight()` over live entries.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured byte budget; `0` means unbounded.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Number of entries evicted so far.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|(_, entry)| entry.key.as_str())
    }

    /// Drops every entry without invoking the eviction callback.
    pub fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
        self.used_bytes = 0;
    }

    /// Verifies byte accounting and index/list agreement.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.order.check_invariants()?;

        if self.index.len() != self.order.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys but recency list holds {}",
                self.index.len(),
                self.order.len()
            )));
        }

        let mut recomputed = 0usize;
        for (id, entry) in self.order.iter() {
            if self.index.get(&entry.key) != Some(&id) {
                return Err(InvariantError::new(format!(
                    "key {:?} is not indexed at its list slot",
                    entry.key
                )));
            }
            recomputed += entry.size();
        }

        if recomputed != self.used_bytes {
            return Err(InvariantError::new(format!(
                "used_bytes is {} but entries sum to {recomputed}",
                self.used_bytes
            )));
        }
        if self.capacity_bytes != 0 && self.used_bytes > self.capacity_bytes {
            return Err(InvariantError::new(format!(
                "used_bytes {} exceeds capacity {}",
                self.used_bytes, self.capacity_bytes
            )));
        }
        Ok(())
    }
}

impl<V> fmt::Debug for LruCore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("len", &self.order.len())
            .field("used_bytes", &self.used_bytes)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("evictions", &self.evictions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ConcurrentLruCache
// ---------------------------------------------------------------------------

/// Point-in-time counters for a [`ConcurrentLruCache`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub bytes: usize,
    pub items: usize,
    pub gets: u64,
    pub hits: u64,
    pub evictions: u64,
}

struct Lazy<V> {
    core: Option<LruCore<V>>,
    on_evicted: Option<OnEvicted<V>>,
    gets: u64,
    hits: u64,
}

/// Thread-safe byte-bounded LRU store.
///
/// Every call holds one `parking_lot::Mutex` for its whole duration, so each
/// operation is atomic with respect to other callers. The underlying
/// [`LruCore`] is only allocated on first insert; a cache created with
/// [`Default`] is usable right away with an unbounded budget.
pub struct ConcurrentLruCache<V> {
    capacity_bytes: usize,
    inner: Mutex<Lazy<V>>,
}

impl<V: Weighted + Clone> ConcurrentLruCache<V> {
    /// Creates a shared store holding at most `capacity_bytes` (0 = unbounded).
    pub fn new(capacity_bytes: usize) -> Self {
        Self::with_eviction_callback(capacity_bytes, None)
    }

    /// Creates a shared store; the callback is handed to the store when it is first built.
    pub fn with_eviction_callback(capacity_bytes: usize, on_evicted: Option<OnEvicted<V>>) -> Self {
        Self {
            capacity_bytes,
            inner: Mutex::new(Lazy {
                core: None,
                on_evicted,
                gets: 0,
                hits: 0,
            }),
        }
    }

    /// Returns a clone of the value and promotes it to most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.gets += 1;
        let value = inner.core.as_mut()?.get(key).cloned();
        if value.is_some() {
            inner.hits += 1;
        }
        value
    }

    /// Inserts or replaces `key`, evicting as needed.
    pub fn add(&self, key: &str, value: V) {
        let mut guard = self.inner.lock();
        let Lazy {
            core, on_evicted, ..
        } = &mut *guard;
        core.get_or_insert_with(|| {
            LruCore::with_eviction_callback(self.capacity_bytes, on_evicted.take())
        })
        .add(key, value);
    }

    /// Evicts the least recently used entry; returns `false` if the store is empty.
    pub fn remove_oldest(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.core.as_mut().is_some_and(LruCore::remove_oldest)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.core.as_ref().map_or(0, LruCore::len)
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> usize {
        let inner = self.inner.lock();
        inner.core.as_ref().map_or(0, LruCore::used_bytes)
    }

    /// Configured byte budget; `0` means unbounded.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Snapshot of size, hit and eviction counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let (bytes, items, evictions) = inner
            .core
            .as_ref()
            .map_or((0, 0, 0), |core| (core.used_bytes(), core.len(), core.evictions()));
        CacheStats {
            bytes,
            items,
            gets: inner.gets,
            hits: inner.hits,
            evictions,
        }
    }

    /// Runs [`LruCore::check_invariants`] under the lock; an unbuilt store is trivially valid.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let inner = self.inner.lock();
        inner
            .core
            .as_ref()
            .map_or(Ok(()), LruCore::check_invariants)
    }
}

impl<V: Weighted + Clone> Default for ConcurrentLruCache<V> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<V> fmt::Debug for ConcurrentLruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentLruCache")
            .field("capacity_bytes", &self.capacity_bytes)
            .finish_non_exhaustive()
    }
}
