//! # Capability Traits
//!
//! The seams between the cache core and the outside world.
//!
//! ```text
//!   ┌──────────────────────┐      miss, self is owner      ┌───────────────────┐
//!   │        Group         │ ────────────────────────────► │   Loader          │
//!   │                      │                               │   load(key)       │
//!   │                      │      miss, peer owns key      └───────────────────┘
//!   │                      │ ──► PeerPicker::pick_peer(key)
//!   │                      │          │
//!   └──────────────────────┘          ▼
//!                              ┌───────────────────┐
//!                              │   PeerGetter      │   transport lives behind
//!                              │   get(request)    │   this trait (HTTP, RPC, ...)
//!                              └───────────────────┘
//! ```
//!
//! | Trait        | Implemented by                 | Called from               |
//! |--------------|--------------------------------|---------------------------|
//! | `Weighted`   | values held by `LruCore`       | byte accounting           |
//! | `Loader`     | the backing data source        | `Group` on owned misses   |
//! | `PeerPicker` | membership / routing layer     | `Group` on every miss     |
//! | `PeerGetter` | one remote node's client       | `Group` on remote misses  |
//!
//! Loaders and peer getters report failure with a [`BoxError`]; the group
//! never inspects it beyond logging or handing it back to the caller.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;

/// Size, in bytes, that a value contributes to a bounded store.
pub trait Weighted {
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Produces the authoritative bytes for a key from the backing store.
///
/// Called only on a local miss for a key this node owns, and at most once per
/// key at a time.
pub trait Loader: Send + Sync {
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError>;
}

impl<L: Loader + ?Sized> Loader for Arc<L> {
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        (**self).load(key)
    }
}

impl<L: Loader + ?Sized> Loader for Box<L> {
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        (**self).load(key)
    }
}

/// Adapts a plain function or closure into a [`Loader`].
///
/// # Example
///
/// ```
/// use shardcache::traits::{Loader, LoaderFn};
///
/// let loader = LoaderFn::new(|key| Ok(format!("value-of-{key}").into_bytes()));
/// assert_eq!(loader.load("a").unwrap(), b"value-of-a");
/// ```
pub struct LoaderFn<F>(F);

impl<F> LoaderFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Loader for LoaderFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        (self.0)(key)
    }
}

impl<F> fmt::Debug for LoaderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoaderFn")
    }
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

/// Request sent to the peer that owns a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub group: String,
    pub key: String,
}

/// Response carrying the owner's bytes for a key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResponse {
    pub value: Vec<u8>,
}

/// Client half of the peer transport: fetches one key from one remote node.
///
/// The call is synchronous from the caller's point of view; timeouts, retries
/// and encoding belong to the implementation.
pub trait PeerGetter: Send + Sync {
    fn get(&self, request: &FetchRequest) -> Result<FetchResponse, BoxError>;
}

/// Chooses the peer that owns a key.
///
/// Returning `None` means "serve locally": either there are no peers or this
/// node owns the key.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

impl<P: PeerPicker + ?Sized> PeerPicker for Arc<P> {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        (**self).pick_peer(key)
    }
}

impl<P: PeerPicker + ?Sized> PeerPicker for Box<P> {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        (**self).pick_peer(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_fn_forwards_errors() {
        let loader = LoaderFn::new(|key| {
            if key == "missing" {
                Err("not found".into())
            } else {
                Ok(key.as_bytes().to_vec())
            }
        });
        assert_eq!(loader.load("k").unwrap(), b"k");
        assert_eq!(loader.load("missing").unwrap_err().to_string(), "not found");
    }

    #[test]
    fn shared_loader_is_a_loader() {
        let loader: Arc<dyn Loader> = Arc::new(LoaderFn::new(|_| Ok(vec![1, 2, 3])));
        assert_eq!(loader.load("x").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn weights_are_byte_lengths() {
        assert_eq!(vec![0u8; 4].weight(), 4);
        assert_eq!("héllo".to_string().weight(), 6);
    }
}
