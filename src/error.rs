//! Error types for shardcache.
//!
//! ## Key Components
//!
//! - [`GroupError`]: Returned by [`Group::get`](crate::group::Group::get) and
//!   [`GroupRegistry::serve`](crate::registry::GroupRegistry::serve).
//! - [`ConfigError`]: Returned when group configuration is incomplete
//!   (e.g. no loader supplied to the builder).
//! - [`InvariantError`]: Returned by `check_invariants` methods when internal
//!   bookkeeping disagrees with the data it describes.
//!
//! ## Example Usage
//!
//! ```
//! use shardcache::builder::GroupBuilder;
//! use shardcache::error::GroupError;
//! use shardcache::registry::GroupRegistry;
//! use shardcache::traits::LoaderFn;
//!
//! let registry = GroupRegistry::new();
//! let loader = LoaderFn::new(|key| Ok(key.as_bytes().to_vec()));
//! let group = registry.new_group("scores", 1 << 20, loader);
//!
//! assert!(matches!(group.get(""), Err(GroupError::EmptyKey)));
//!
//! let err = GroupBuilder::new("orphan").try_build(&registry).unwrap_err();
//! assert_eq!(err.message(), "group `orphan` has no loader");
//! ```

use std::fmt;
use std::sync::Arc;

/// Error type produced by the external capabilities (loader, peer getter).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Loader error shared by every caller coalesced onto one load.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// GroupError
// ---------------------------------------------------------------------------

/// Error returned from the read path of a cache group.
///
/// Cloning is cheap; a failed load hands the same underlying error instance to
/// every coalesced waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GroupError {
    /// The key was empty.
    #[error("key is required")]
    EmptyKey,

    /// The loader failed; the loader's error is passed through unchanged.
    #[error(transparent)]
    Load(SharedError),

    /// An inbound peer request named a group this process does not host.
    #[error("no such group: {0}")]
    NoSuchGroup(String),
}

impl GroupError {
    /// Wraps a loader error.
    pub fn load(err: BoxError) -> Self {
        Self::Load(Arc::from(err))
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when group configuration is invalid.
///
/// Produced by [`GroupBuilder::try_build`](crate::builder::GroupBuilder::try_build).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    msg: String,
}

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
