pub mod cache;

pub use cache::create_redis_client;
pub use cache::CacheKey;
pub use cache::RedisCacheStore;
