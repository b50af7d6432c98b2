//! Computation cache.
//!
//! Aggregate results are stored as JSON blobs under
//! `calculations:<fingerprint>:<prefix>`. The store is best-effort: a missing
//! or failing backend turns the cache into a pass-through.

pub mod computation;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis_store;
pub mod store;

pub use computation::{cache_key, ComputationCache, KEY_NAMESPACE};
pub use memory::MemoryStore;
#[cfg(feature = "redis-cache")]
pub use redis_store::RedisStore;
pub use store::{CacheError, CacheStore};
