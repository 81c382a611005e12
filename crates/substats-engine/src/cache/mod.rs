//! Cache layer: key/value stores and typed cached entries

mod entry;
mod memory;
mod redis_store;
mod store;

pub use entry::CachedEntry;
pub use memory::InMemoryCache;
pub use redis_store::RedisCache;
pub use store::CacheStore;

/// Key of the cached metrics snapshot
pub const STATS_KEY: &str = "stats";

/// Key of the cached top-subscriber table
pub const SUBSCRIBERS_KEY: &str = "subscribers";
