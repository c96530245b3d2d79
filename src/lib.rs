//! shardcache: a read-through byte cache that shards keys across peers.
//!
//! Callers ask a [`Group`](group::Group) for a key. On a local miss the group
//! either fetches the value from the peer that owns the key, or, when this
//! node is the owner, runs the group's [`Loader`](traits::Loader) and keeps
//! the result in a byte-bounded LRU store. Concurrent misses for one key share
//! a single load.
//!
//! ## Modules
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | `policy`    | `LruCore` and its synchronized wrapper                    |
//! | `ds`        | slot arena, recency list, consistent hash ring            |
//! | `coalesce`  | per-key call coalescing                                   |
//! | `group`     | the read path                                             |
//! | `registry`  | owned name → group registry, inbound peer requests        |
//! | `peers`     | ring-backed `PeerPicker`                                  |
//! | `builder`   | group configuration                                       |
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod builder;
pub mod coalesce;
pub mod ds;
pub mod error;
pub mod group;
pub mod peers;
pub mod policy;
pub mod prelude;
pub mod registry;
pub mod traits;
pub mod view;
