pub mod app_config;
pub mod database;
pub mod list_repo;
pub mod redis_repo;
pub mod session_repo;

pub use redis_repo::RedisClient;
pub use session_repo::{RedisRateLimiter, RedisSessionStore};
