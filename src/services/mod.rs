// Service exports
pub mod cache;
pub mod postgres;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use postgres::{PostgresClient, PostgresError, RequestFilter, TransitionOutcome};
