//! Application services and ports.

#![forbid(unsafe_code)]

mod rate_limit_service;

pub use rate_limit_service::{
    AttemptOutcome, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MINUTES, RateLimitPolicy,
    RateLimitRepository, RateLimitRule, RateLimitService, RateLimitStatus,
};
