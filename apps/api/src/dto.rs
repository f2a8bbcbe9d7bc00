//! Wire payloads for the rate limit API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rihlah_application::RateLimitStatus;
use rihlah_domain::{RateLimitDecision, format_retry_delay};

/// Body of a rate limit check.
#[derive(Debug, Default, Deserialize)]
pub struct CheckRateLimitRequest {
    /// Guarded action being attempted.
    #[serde(default)]
    pub action_type: Option<String>,
    /// Optional override of the configured attempt ceiling.
    #[serde(default)]
    pub max_attempts: Option<i32>,
    /// Optional override of the configured window length.
    #[serde(default)]
    pub window_minutes: Option<i64>,
}

/// Successful check outcome.
#[derive(Debug, Serialize)]
pub struct CheckRateLimitResponse {
    /// Whether the attempt may proceed.
    pub allowed: bool,
    /// Attempts left in the current window.
    pub remaining: i32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
}

impl From<RateLimitDecision> for CheckRateLimitResponse {
    fn from(decision: RateLimitDecision) -> Self {
        Self {
            allowed: decision.allowed,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        }
    }
}

/// Body of a denied check.
#[derive(Debug, Serialize)]
pub struct RateLimitDeniedResponse {
    /// Fixed denial message shown to callers.
    pub error: &'static str,
    /// When the current window ends and attempts resume.
    pub reset_at: DateTime<Utc>,
    /// Always zero for a denied check.
    pub remaining: i32,
}

impl RateLimitDeniedResponse {
    pub fn new(reset_at: DateTime<Utc>) -> Self {
        Self {
            error: "Too many attempts. Please try again later.",
            reset_at,
            remaining: 0,
        }
    }
}

/// One tracked counter in the admin listing.
#[derive(Debug, Serialize)]
pub struct RateLimitRecordResponse {
    /// Record identifier, used by reset and delete.
    pub id: Uuid,
    /// Caller key, typically a client network address.
    pub identifier: String,
    /// Guarded action this counter applies to.
    pub action_type: String,
    /// Attempts recorded inside the current window.
    pub attempt_count: i32,
    /// When the current counting window began.
    pub window_start: DateTime<Utc>,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
    /// Whether the counter currently denies attempts.
    pub is_blocked: bool,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
    /// Human wait hint until the window ends.
    pub resets_in: String,
}

impl From<RateLimitStatus> for RateLimitRecordResponse {
    fn from(status: RateLimitStatus) -> Self {
        let record = status.record;
        Self {
            id: record.id.as_uuid(),
            identifier: record.identifier,
            action_type: record.action_type.as_str().to_owned(),
            attempt_count: record.attempt_count,
            window_start: record.window_start,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_blocked: status.is_blocked,
            reset_at: status.reset_at,
            resets_in: format_retry_delay(status.reset_at, Utc::now()),
        }
    }
}

/// Outcome of clearing every counter.
#[derive(Debug, Serialize)]
pub struct ClearRateLimitsResponse {
    /// How many records were removed.
    pub deleted: u64,
}

/// Health probe payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Fixed status marker.
    pub status: &'static str,
}
