//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_rate_limit_repository;
mod postgres_rate_limit_repository;

pub use in_memory_rate_limit_repository::InMemoryRateLimitRepository;
pub use postgres_rate_limit_repository::PostgresRateLimitRepository;
