//! Owned registry of cache groups.
//!
//! A process creates one [`GroupRegistry`] at startup and hands it (usually
//! behind an `Arc`) to whatever needs to create or find groups, including the
//! server side of the peer transport. Groups are created once per name and
//! looked up many times; lookups only take the shared lock.
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::registry::GroupRegistry;
//! use shardcache::traits::{FetchRequest, LoaderFn};
//!
//! let registry = GroupRegistry::new();
//! registry.new_group("users", 64 << 20, LoaderFn::new(|key| Ok(key.as_bytes().to_vec())));
//!
//! let users = registry.get_group("users").unwrap();
//! assert_eq!(users.get("alice").unwrap(), "alice");
//! assert!(registry.get_group("Users").is_none());
//!
//! // What a peer transport does with an inbound request:
//! let response = registry
//!     .serve(&FetchRequest { group: "users".into(), key: "bob".into() })
//!     .unwrap();
//! assert_eq!(response.value, b"bob");
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::GroupError;
use crate::group::Group;
use crate::traits::{FetchRequest, FetchResponse, Loader};

/// Name-keyed collection of [`Group`]s.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<FxHashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group and installs it under `name`.
    ///
    /// A group already registered under the same name is replaced; callers
    /// holding the old `Arc<Group>` keep using it.
    pub fn new_group<L>(&self, name: impl Into<String>, cache_bytes: usize, loader: L) -> Arc<Group>
    where
        L: Loader + 'static,
    {
        self.insert(name.into(), cache_bytes, Box::new(loader))
    }

    pub(crate) fn insert(&self, name: String, cache_bytes: usize, loader: Box<dyn Loader>) -> Arc<Group> {
        let group = Arc::new(Group::new(name.clone(), cache_bytes, loader));
        let mut groups = self.groups.write();
        if groups.insert(name, Arc::clone(&group)).is_some() {
            tracing::debug!(group = %group.name(), "replaced existing group");
        }
        group
    }

    /// Looks up a group by exact, case-sensitive name.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        let groups = self.groups.read();
        groups.get(name).cloned()
    }

    /// Names of all registered groups, sorted.
    pub fn group_names(&self) -> Vec<String> {
        let groups = self.groups.read();
        let mut names: Vec<String> = groups.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Answers a fetch request from a peer.
    pub fn serve(&self, request: &FetchRequest) -> Result<FetchResponse, GroupError> {
        let group = self
            .get_group(&request.group)
            .ok_or_else(|| GroupError::NoSuchGroup(request.group.clone()))?;
        let value = group.get(&request.key)?;
        Ok(FetchResponse {
            value: value.to_vec(),
        })
    }
}

impl fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.group_names())
            .finish()
    }
}
