//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod rate_limit;

pub use rate_limit::{
    ActionType, RateLimitDecision, RateLimitRecord, RateLimitRecordId, format_retry_delay,
};
