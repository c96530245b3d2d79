//! Group configuration.
//!
//! [`GroupBuilder`] gathers the settings of a cache group and installs the
//! result in a [`GroupRegistry`]. It is the place to validate configuration:
//! `try_build` reports a missing loader as a [`ConfigError`], `build` treats
//! it as a programming error and panics.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use shardcache::builder::GroupBuilder;
//! use shardcache::peers::RingPeerPicker;
//! use shardcache::registry::GroupRegistry;
//! use shardcache::traits::LoaderFn;
//!
//! let registry = GroupRegistry::new();
//! let group = GroupBuilder::new("thumbnails")
//!     .cache_bytes(64 << 20)
//!     .loader(LoaderFn::new(|key| Ok(key.len().to_string().into_bytes())))
//!     .peers(RingPeerPicker::new("10.0.0.1:8001"))
//!     .build(&registry);
//!
//! assert_eq!(group.get("abc").unwrap(), "3");
//! assert!(Arc::ptr_eq(&group, &registry.get_group("thumbnails").unwrap()));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::group::Group;
use crate::registry::GroupRegistry;
use crate::traits::{Loader, PeerPicker};

/// Builder for a [`Group`].
pub struct GroupBuilder {
    name: String,
    cache_bytes: usize,
    loader: Option<Box<dyn Loader>>,
    peers: Option<Box<dyn PeerPicker>>,
}

impl GroupBuilder {
    /// Starts a builder for the group called `name` with an unbounded store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_bytes: 0,
            loader: None,
            peers: None,
        }
    }

    /// Byte budget of the local store; `0` means unbounded.
    pub fn cache_bytes(mut self, cache_bytes: usize) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    pub fn loader<L>(mut self, loader: L) -> Self
    where
        L: Loader + 'static,
    {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Registers `peers` on the group as soon as it is built.
    pub fn peers<P>(mut self, peers: P) -> Self
    where
        P: PeerPicker + 'static,
    {
        self.peers = Some(Box::new(peers));
        self
    }

    /// Builds the group and installs it in `registry`.
    pub fn try_build(self, registry: &GroupRegistry) -> Result<Arc<Group>, ConfigError> {
        let Some(loader) = self.loader else {
            return Err(ConfigError::new(format!("group `{}` has no loader", self.name)));
        };
        let group = registry.insert(self.name, self.cache_bytes, loader);
        if let Some(peers) = self.peers {
            group.register_peers(peers);
        }
        Ok(group)
    }

    /// Like [`try_build`](Self::try_build) but panics on invalid configuration.
    pub fn build(self, registry: &GroupRegistry) -> Arc<Group> {
        match self.try_build(registry) {
            Ok(group) => group,
            Err(err) => panic!("invalid group configuration: {err}"),
        }
    }
}

impl fmt::Debug for GroupBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("name", &self.name)
            .field("cache_bytes", &self.cache_bytes)
            .field("has_loader", &self.loader.is_some())
            .field("has_peers", &self.peers.is_some())
            .finish()
    }
}
