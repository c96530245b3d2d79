pub mod hash_ring;
pub mod intrusive_list;
pub mod slot_arena;

pub use hash_ring::{DEFAULT_REPLICAS, HashFn, HashRing};
pub use intrusive_list::IntrusiveList;
pub use slot_arena::{SlotArena, SlotId};
