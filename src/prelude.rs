pub use crate::builder::GroupBuilder;
pub use crate::coalesce::Coalescer;
pub use crate::ds::{HashRing, SlotArena, SlotId};
pub use crate::error::{BoxError, ConfigError, GroupError, InvariantError};
pub use crate::group::{Group, GroupStats};
pub use crate::peers::RingPeerPicker;
pub use crate::policy::{CacheStats, ConcurrentLruCache, LruCore};
pub use crate::registry::GroupRegistry;
pub use crate::traits::{
    FetchRequest, FetchResponse, Loader, LoaderFn, PeerGetter, PeerPicker, Weighted,
};
pub use crate::view::ByteView;
