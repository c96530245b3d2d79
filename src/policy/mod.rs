pub mod lru;

pub use lru::{CacheStats, ConcurrentLruCache, LruCore, OnEvicted};
