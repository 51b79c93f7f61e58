pub mod cache;
pub mod redis;

pub use self::cache::{CacheStore, FileCacheStore};
pub use self::redis::{create_redis_client, RedisCacheStore};
