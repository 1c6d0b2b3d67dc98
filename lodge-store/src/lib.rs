pub mod app_config;
pub mod backend;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;

pub use backend::StoreBackend;
pub use database::DbClient;
pub use events::EventProducer;
pub use memory::{MemoryHub, MemoryReservationCache, MemorySessionCaches};
pub use redis_repo::RedisClient;
