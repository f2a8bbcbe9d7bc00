//! Rate limit domain types and window arithmetic.
//!
//! One [`RateLimitRecord`] exists per (identifier, action type) pair and
//! accumulates attempts inside a fixed time window. The transition rules in
//! [`RateLimitRecord::register_attempt`] are the single source of truth for
//! every storage backend.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rihlah_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categories of guarded authentication actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Sign-in attempts against an existing account.
    Login,
    /// New account registrations.
    Registration,
    /// Password reset requests.
    PasswordReset,
}

impl ActionType {
    /// Returns a stable storage value for this action type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Registration => "registration",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Returns all known action types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ActionType] = &[
            ActionType::Login,
            ActionType::Registration,
            ActionType::PasswordReset,
        ];

        ALL
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(Self::Login),
            "registration" => Ok(Self::Registration),
            "password_reset" => Ok(Self::PasswordReset),
            _ => Err(AppError::Validation(format!(
                "unknown action type '{value}'"
            ))),
        }
    }
}

/// Unique identifier for a rate limit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitRecordId(Uuid);

impl RateLimitRecordId {
    /// Creates a new random record identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RateLimitRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RateLimitRecordId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One attempt counter for an (identifier, action type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// Unique record identifier.
    pub id: RateLimitRecordId,
    /// Caller key, typically a client network address.
    pub identifier: String,
    /// Guarded action this counter applies to.
    pub action_type: ActionType,
    /// Attempts recorded inside the current window.
    pub attempt_count: i32,
    /// When the current counting window began.
    pub window_start: DateTime<Utc>,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl RateLimitRecord {
    /// Creates the record for a pair's first ever attempt.
    #[must_use]
    pub fn first_attempt(
        identifier: impl Into<String>,
        action_type: ActionType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RateLimitRecordId::new(),
            identifier: identifier.into(),
            action_type,
            attempt_count: 1,
            window_start: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// When the current counting window ends.
    #[must_use]
    pub fn window_end(&self, window_minutes: i64) -> DateTime<Utc> {
        self.window_start + Duration::minutes(window_minutes)
    }

    /// Whether the current window has fully elapsed.
    #[must_use]
    pub fn window_expired(&self, now: DateTime<Utc>, window_minutes: i64) -> bool {
        now >= self.window_end(window_minutes)
    }

    /// Whether this record currently denies new attempts.
    ///
    /// A record blocks iff the ceiling was reached and the window is still
    /// active. An expired window never blocks, even with a saturated counter.
    #[must_use]
    pub fn is_blocked(&self, now: DateTime<Utc>, max_attempts: i32, window_minutes: i64) -> bool {
        self.attempt_count >= max_attempts && now < self.window_end(window_minutes)
    }

    /// Applies one attempt to the record and reports whether it was counted.
    ///
    /// An expired window restarts the counter at 1. Inside an active window
    /// the counter increments until it reaches `max_attempts`; attempts at
    /// the ceiling are rejected without mutating the record.
    pub fn register_attempt(
        &mut self,
        now: DateTime<Utc>,
        max_attempts: i32,
        window_minutes: i64,
    ) -> bool {
        if self.window_expired(now, window_minutes) {
            self.attempt_count = 1;
            self.window_start = now;
            self.updated_at = now;
            return true;
        }

        if self.attempt_count < max_attempts {
            self.attempt_count += 1;
            self.updated_at = now;
            return true;
        }

        false
    }

    /// Clears the counter and restarts the window, keeping the record.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.attempt_count = 0;
        self.window_start = now;
        self.updated_at = now;
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the attempt may proceed.
    pub allowed: bool,
    /// Attempts left in the current window.
    pub remaining: i32,
    /// When the current window ends and the counter restarts.
    pub reset_at: DateTime<Utc>,
}

/// Formats the delay until `reset_at` as a human wait hint.
///
/// Rounds up to whole minutes: `"now"` when already past, `"1 minute"`
/// singular, otherwise `"<n> minutes"`.
#[must_use]
pub fn format_retry_delay(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = reset_at - now;
    if remaining <= Duration::zero() {
        return "now".to_owned();
    }

    let minutes = (remaining.num_milliseconds() + 59_999) / 60_000;
    if minutes == 1 {
        "1 minute".to_owned()
    } else {
        format!("{minutes} minutes")
    }
}
