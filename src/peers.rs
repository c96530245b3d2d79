//! Ring-backed peer selection.
//!
//! [`RingPeerPicker`] is the routing half of a peer pool: it knows the local
//! node's name, places every member on a [`HashRing`], and maps the owning
//! node of a key to the [`PeerGetter`] that reaches it. Keys owned by the
//! local node resolve to `None` so the group loads them itself.
//!
//! Membership changes go through [`RingPeerPicker::set_peers`], which builds
//! a fresh ring and swaps it in under a write lock; lookups take the read
//! lock, so a lookup never observes a half-built ring.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use shardcache::error::BoxError;
//! use shardcache::peers::RingPeerPicker;
//! use shardcache::traits::{FetchRequest, FetchResponse, PeerGetter, PeerPicker};
//!
//! struct Unreachable;
//!
//! impl PeerGetter for Unreachable {
//!     fn get(&self, _: &FetchRequest) -> Result<FetchResponse, BoxError> {
//!         Err("connection refused".into())
//!     }
//! }
//!
//! let picker = RingPeerPicker::new("10.0.0.1:8001");
//! picker.set_peers([
//!     ("10.0.0.1:8001".to_string(), Arc::new(Unreachable) as Arc<dyn PeerGetter>),
//!     ("10.0.0.2:8001".to_string(), Arc::new(Unreachable) as Arc<dyn PeerGetter>),
//! ]);
//!
//! let remote = (0..100)
//!     .map(|i| format!("key-{i}"))
//!     .filter(|key| picker.pick_peer(key).is_some())
//!     .count();
//! assert!(remote > 0 && remote < 100);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ds::{DEFAULT_REPLICAS, HashFn, HashRing};
use crate::traits::{PeerGetter, PeerPicker};

struct Membership {
    ring: HashRing,
    getters: FxHashMap<String, Arc<dyn PeerGetter>>,
}

/// Picks the owning peer for a key from a consistent hash ring.
pub struct RingPeerPicker {
    self_name: String,
    replicas: usize,
    hash: Option<HashFn>,
    members: RwLock<Membership>,
}

impl RingPeerPicker {
    /// Creates a picker for the node called `self_name` with no peers yet.
    pub fn new(self_name: impl Into<String>) -> Self {
        Self::with_replicas(self_name, DEFAULT_REPLICAS)
    }

    pub fn with_replicas(self_name: impl Into<String>, replicas: usize) -> Self {
        Self::build(self_name.into(), replicas, None)
    }

    /// Uses `hash` instead of CRC-32 for ring placement.
    pub fn with_hasher(self_name: impl Into<String>, replicas: usize, hash: HashFn) -> Self {
        Self::build(self_name.into(), replicas, Some(hash))
    }

    fn build(self_name: String, replicas: usize, hash: Option<HashFn>) -> Self {
        let ring = Self::empty_ring(replicas, hash);
        Self {
            self_name,
            replicas,
            hash,
            members: RwLock::new(Membership {
                ring,
                getters: FxHashMap::default(),
            }),
        }
    }

    fn empty_ring(replicas: usize, hash: Option<HashFn>) -> HashRing {
        match hash {
            Some(hash) => HashRing::with_hasher(replicas, hash),
            None => HashRing::new(replicas),
        }
    }

    /// Replaces the membership with `peers` (name, client) pairs.
    ///
    /// The local node should be listed too, so every node builds the same
    /// ring; its client is never used.
    pub fn set_peers<I>(&self, peers: I)
    where
        I: IntoIterator<Item = (String, Arc<dyn PeerGetter>)>,
    {
        let getters: FxHashMap<String, Arc<dyn PeerGetter>> = peers.into_iter().collect();
        // Sorted so colliding virtual nodes resolve the same way on every node.
        let mut names: Vec<&String> = getters.keys().collect();
        names.sort_unstable();
        let mut ring = Self::empty_ring(self.replicas, self.hash);
        ring.add(names);

        tracing::debug!(
            node = %self.self_name,
            peers = getters.len(),
            virtual_nodes = ring.len(),
            "peer membership updated"
        );
        *self.members.write() = Membership { ring, getters };
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    /// Name of the node owning `key`, including the local node.
    pub fn owner_of(&self, key: &str) -> Option<String> {
        let members = self.members.read();
        members.ring.get(key).map(str::to_owned)
    }

    /// Names of every member, sorted.
    pub fn peers(&self) -> Vec<String> {
        let members = self.members.read();
        members.ring.nodes().into_iter().map(str::to_owned).collect()
    }
}

impl PeerPicker for RingPeerPicker {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let members = self.members.read();
        let owner = members.ring.get(key)?;
        if owner == self.self_name {
            return None;
        }
        tracing::debug!(node = %self.self_name, peer = %owner, key, "picked remote peer");
        members.getters.get(owner).cloned()
    }
}

impl fmt::Debug for RingPeerPicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingPeerPicker")
            .field("self_name", &self.self_name)
            .field("replicas", &self.replicas)
            .field("peers", &self.peers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::traits::{FetchRequest, FetchResponse};

    struct Named(&'static str);

    impl PeerGetter for Named {
        fn get(&self, _: &FetchRequest) -> Result<FetchResponse, BoxError> {
            Ok(FetchResponse {
                value: self.0.as_bytes().to_vec(),
            })
        }
    }

    fn getter(name: &'static str) -> (String, Arc<dyn PeerGetter>) {
        (name.to_string(), Arc::new(Named(name)))
    }

    fn decimal_hash(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    fn fetch(peer: &Arc<dyn PeerGetter>) -> String {
        let request = FetchRequest {
            group: "g".into(),
            key: "k".into(),
        };
        String::from_utf8(peer.get(&request).unwrap().value).unwrap()
    }

    #[test]
    fn no_peers_means_serve_locally() {
        let picker = RingPeerPicker::new("self");
        assert!(picker.pick_peer("anything").is_none());
        assert_eq!(picker.owner_of("anything"), None);
    }

    #[test]
    fn keys_owned_by_self_are_local() {
        // "2" -> 20, 21, 22; "4" -> 40, 41, 42
        let picker = RingPeerPicker::with_hasher("2", 3, decimal_hash);
        picker.set_peers([getter("2"), getter("4")]);

        assert!(picker.pick_peer("15").is_none());
        assert_eq!(picker.owner_of("15").as_deref(), Some("2"));

        let remote = picker.pick_peer("30").expect("4 owns 30");
        assert_eq!(fetch(&remote), "4");

        // Wraps past 42 back to 20.
        assert!(picker.pick_peer("50").is_none());
    }

    #[test]
    fn set_peers_replaces_membership() {
        let picker = RingPeerPicker::with_hasher("2", 3, decimal_hash);
        picker.set_peers([getter("2"), getter("4")]);
        assert_eq!(picker.peers(), vec!["2".to_string(), "4".to_string()]);

        picker.set_peers([getter("2"), getter("6")]);
        assert_eq!(picker.peers(), vec!["2".to_string(), "6".to_string()]);
        let remote = picker.pick_peer("30").expect("6 owns 30 now");
        assert_eq!(fetch(&remote), "6");
    }
}
