//! # Cache Group
//!
//! A [`Group`] is one named cache namespace: a byte-bounded local store, a
//! coalescer, an optional peer picker, and the loader that produces values
//! for keys this node owns.
//!
//! ## Read Path
//!
//! ```text
//!   get(key)
//!     │
//!     ├─ key empty ─────────────────────────────► Err(EmptyKey)
//!     │
//!     ├─ local store hit ───────────────────────► Ok(value)
//!     │
//!     └─ miss ─► coalescer.work(key, ...)        (one execution per key)
//!                  │
//!                  ├─ peer picked ─► peer.get({group, key})
//!                  │                   ├─ Ok  ─────────────────► Ok(value)  (not stored locally)
//!                  │                   └─ Err ─► warn, fall through
//!                  │
//!                  └─ loader.load(key)
//!                        ├─ Ok  ─► store.add(key, value) ──────► Ok(value)
//!                        └─ Err ───────────────────────────────► Err(Load)
//! ```
//!
//! Only the owning node keeps the authoritative copy; values fetched from a
//! peer are returned to the caller but never added to the local store.
//!
//! ## Peer registration
//!
//! [`Group::register_peers`] may be called once, before traffic starts.
//! A second call panics: peer topology is fixed for the life of a group.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coalesce::Coalescer;
use crate::error::{BoxError, GroupError};
use crate::policy::lru::{CacheStats, ConcurrentLruCache};
use crate::traits::{FetchRequest, Loader, PeerGetter, PeerPicker};
use crate::view::ByteView;

type LoadResult = Result<ByteView, GroupError>;

#[derive(Debug, Default)]
struct GroupCounters {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    loads_executed: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errs: AtomicU64,
}

impl GroupCounters {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> GroupStats {
        GroupStats {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            loads_executed: self.loads_executed.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counters for a [`Group`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupStats {
    /// Calls to `get` with a non-empty key.
    pub gets: u64,
    /// Gets answered from the local store.
    pub cache_hits: u64,
    /// Gets that missed and entered the coalescer.
    pub loads: u64,
    /// Loads that ran a peer fetch or the loader; concurrent misses for the
    /// same key share one of these.
    pub loads_executed: u64,
    /// Values served by a remote peer.
    pub peer_loads: u64,
    /// Remote fetches that failed and fell back to the loader.
    pub peer_errors: u64,
    /// Successful loader calls.
    pub local_loads: u64,
    /// Failed loader calls.
    pub local_load_errs: u64,
}

/// A named cache namespace.
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    main_cache: ConcurrentLruCache<ByteView>,
    flight: Coalescer<String, LoadResult>,
    peers: OnceLock<Box<dyn PeerPicker>>,
    counters: GroupCounters,
}

impl Group {
    pub(crate) fn new(name: String, cache_bytes: usize, loader: Box<dyn Loader>) -> Self {
        Self {
            name,
            loader,
            main_cache: ConcurrentLruCache::new(cache_bytes),
            flight: Coalescer::new(),
            peers: OnceLock::new(),
            counters: GroupCounters::default(),
        }
    }

    /// Name the group is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value for `key`, loading it on a miss.
    pub fn get(&self, key: &str) -> Result<ByteView, GroupError> {
        if key.is_empty() {
            return Err(GroupError::EmptyKey);
        }
        GroupCounters::inc(&self.counters.gets);

        if let Some(value) = self.main_cache.get(key) {
            GroupCounters::inc(&self.counters.cache_hits);
            tracing::debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.load(key)
    }

    /// Installs the peer picker used to route misses to owning nodes.
    ///
    /// # Panics
    ///
    /// Panics if peers were already registered for this group.
    pub fn register_peers<P>(&self, peers: P)
    where
        P: PeerPicker + 'static,
    {
        if self.peers.set(Box::new(peers)).is_err() {
            panic!("register_peers called more than once for group `{}`", self.name);
        }
    }

    /// Snapshot of the group's read-path counters.
    pub fn stats(&self) -> GroupStats {
        self.counters.snapshot()
    }

    /// Counters of the local store.
    pub fn cache_stats(&self) -> CacheStats {
        self.main_cache.stats()
    }

    fn load(&self, key: &str) -> LoadResult {
        GroupCounters::inc(&self.counters.loads);
        self.flight.work(key.to_owned(), || {
            // A previous leader may have filled the store after our miss.
            if let Some(value) = self.main_cache.get(key) {
                GroupCounters::inc(&self.counters.cache_hits);
                return Ok(value);
            }
            GroupCounters::inc(&self.counters.loads_executed);

            if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
                match self.get_from_peer(peer.as_ref(), key) {
                    Ok(value) => {
                        GroupCounters::inc(&self.counters.peer_loads);
                        return Ok(value);
                    },
                    Err(err) => {
                        GroupCounters::inc(&self.counters.peer_errors);
                        tracing::warn!(
                            group = %self.name,
                            key,
                            error = %err,
                            "peer fetch failed, loading locally"
                        );
                    },
                }
            }

            self.get_locally(key)
        })
    }

    fn get_locally(&self, key: &str) -> LoadResult {
        match self.loader.load(key) {
            Ok(bytes) => {
                GroupCounters::inc(&self.counters.local_loads);
                tracing::debug!(group = %self.name, key, bytes = bytes.len(), "loaded locally");
                let value = ByteView::from(bytes);
                self.main_cache.add(key, value.clone());
                Ok(value)
            },
            Err(err) => {
                GroupCounters::inc(&self.counters.local_load_errs);
                Err(GroupError::load(err))
            },
        }
    }

    fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView, BoxError> {
        let request = FetchRequest {
            group: self.name.clone(),
            key: key.to_owned(),
        };
        let response = peer.get(&request)?;
        Ok(ByteView::from(response.value))
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("main_cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}
