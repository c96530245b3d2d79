//! Consistent hash ring with virtual replicas.
//!
//! Maps an arbitrary key to one of a set of registered node names. Each node
//! is placed on the ring `replicas` times, at `hash(node + decimal(i))` for
//! `i` in `0..replicas`, which smooths the distribution and bounds how many
//! keys move when a node joins.
//!
//! ## Architecture
//!
//! ```text
//!   ring (sorted u32):   [ 0x0a11 | 0x3f02 | 0x77c0 | 0xb913 | 0xe004 ]
//!                           node2    node1    node2    node1    node2
//!
//!   get(key):
//!     h = hash(key)               e.g. 0x8000
//!     idx = first ring[i] >= h    -> 3 (0xb913)
//!     idx %= ring.len()           wraps past the end back to 0
//!     return nodes[ring[idx]]     -> "node1"
//! ```
//!
//! ## Determinism
//!
//! Every cooperating process must agree on ownership without talking to each
//! other, so the hash must depend only on the bytes. The default is
//! CRC-32/IEEE via [`crc32fast::hash`].
//!
//! Membership only grows through [`HashRing::add`]; rebuild a fresh ring to
//! shrink it (see [`RingPeerPicker::set_peers`](crate::peers::RingPeerPicker::set_peers)).
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::ds::HashRing;
//!
//! let mut ring = HashRing::new(3);
//! ring.add(["node1", "node2"]);
//!
//! let owner = ring.get("user:42").unwrap();
//! assert_eq!(ring.get("user:42"), Some(owner));
//! ```

use std::fmt;

use rustc_hash::FxHashMap;

/// Hash function used to place nodes and keys on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Virtual replicas per node when none is configured.
pub const DEFAULT_REPLICAS: usize = 50;

/// Consistent hash ring mapping keys to node names.
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    ring: Vec<u32>,
    nodes: FxHashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring that hashes with CRC-32/IEEE.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32fast::hash)
    }

    /// Creates an empty ring with a caller-supplied hash function.
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            ring: Vec::new(),
            nodes: FxHashMap::default(),
        }
    }

    /// Places every node on the ring `replicas` times, then re-sorts.
    ///
    /// When two virtual nodes collide on one hash the later node takes the
    /// slot; the hash still appears once in the ring.
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let point = (self.hash)(format!("{node}{i}").as_bytes());
                if self.nodes.insert(point, node.to_owned()).is_none() {
                    self.ring.push(point);
                }
            }
        }
        self.ring.sort_unstable();
    }

    /// Returns the node owning `key`, or `None` if the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&point| point < hash);
        let point = self.ring[idx % self.ring.len()];
        self.nodes.get(&point).map(String::as_str)
    }

    /// Number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Distinct physical node names, sorted.
    pub fn nodes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.values().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.ring.len())
            .field("nodes", &self.nodes())
            .finish()
    }
}
