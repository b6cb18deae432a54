pub mod app_config;
pub mod redis_repo;
pub mod remote;
pub mod resiliency;

pub use redis_repo::RedisInventoryStore;
pub use remote::{RemoteInventoryStore, RemoteUserDirectory};
pub use resiliency::CircuitBreaker;
