//! Result caches for finished city models.

pub mod cache;
pub mod schema;
pub mod sqlite;

pub use cache::{CachePolicy, CityCache, MemoryCache};
pub use sqlite::SqliteCache;
