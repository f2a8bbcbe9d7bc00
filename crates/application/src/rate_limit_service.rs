//! Rate limiting ports and application service.
//!
//! Implements a fixed-window rate limiter backed by the `rate_limits`
//! database table. Follows OWASP Credential Stuffing Prevention cheat sheet
//! recommendations for per-IP throttling of login, registration and
//! password reset attempts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use rihlah_core::{AppError, AppResult, NonEmptyString};
use rihlah_domain::{ActionType, RateLimitDecision, RateLimitRecord, RateLimitRecordId};

/// Default attempt ceiling applied to every guarded action.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Default counting window in minutes applied to every guarded action.
pub const DEFAULT_WINDOW_MINUTES: i64 = 15;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Repository port for rate limit persistence.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Records an attempt for the given pair as one atomic check-and-increment.
    ///
    /// Uses an UPSERT pattern: a missing record is created at count 1, an
    /// expired window restarts the counter, an active window increments it
    /// up to `max_attempts`. Attempts at the ceiling are reported as not
    /// counted and leave the record untouched.
    async fn record_attempt(
        &self,
        identifier: &str,
        action_type: ActionType,
        max_attempts: i32,
        window_minutes: i64,
    ) -> AppResult<AttemptOutcome>;

    /// Returns every record, most recently written first.
    async fn list(&self) -> AppResult<Vec<RateLimitRecord>>;

    /// Clears the counter of one record and restarts its window.
    async fn reset(&self, id: RateLimitRecordId) -> AppResult<()>;

    /// Removes one record entirely.
    async fn delete(&self, id: RateLimitRecordId) -> AppResult<()>;

    /// Removes every record unconditionally. Returns the removed count.
    async fn delete_all(&self) -> AppResult<u64>;

    /// Removes records whose window started before the given cutoff.
    async fn delete_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Post-state of the pair's record after one attempt was applied.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Whether the attempt was counted or rejected at the ceiling.
    pub counted: bool,
    /// Attempts in the current window, including this one when counted.
    pub attempt_count: i32,
    /// When the current window started.
    pub window_start: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a rate limit rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Guarded action this rule applies to.
    pub action_type: ActionType,
    /// Maximum number of attempts allowed in the window.
    pub max_attempts: i32,
    /// Window duration in minutes.
    pub window_minutes: i64,
}

impl RateLimitRule {
    /// Creates a new rate limit rule.
    #[must_use]
    pub fn new(action_type: ActionType, max_attempts: i32, window_minutes: i64) -> Self {
        Self {
            action_type,
            max_attempts,
            window_minutes,
        }
    }

    /// Returns a copy of this rule with caller-supplied overrides applied.
    ///
    /// Overrides must be positive; the configured values are kept where an
    /// override is absent.
    pub fn with_overrides(
        &self,
        max_attempts: Option<i32>,
        window_minutes: Option<i64>,
    ) -> AppResult<Self> {
        if let Some(value) = max_attempts
            && value <= 0
        {
            return Err(AppError::Validation(
                "max_attempts must be a positive integer".to_owned(),
            ));
        }

        if let Some(value) = window_minutes
            && value <= 0
        {
            return Err(AppError::Validation(
                "window_minutes must be a positive integer".to_owned(),
            ));
        }

        Ok(Self {
            action_type: self.action_type,
            max_attempts: max_attempts.unwrap_or(self.max_attempts),
            window_minutes: window_minutes.unwrap_or(self.window_minutes),
        })
    }
}

/// Per-action rate limit thresholds shared by the check path and the
/// administrative display.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    rules: HashMap<ActionType, RateLimitRule>,
}

impl RateLimitPolicy {
    /// Replaces the rule for the given action type.
    #[must_use]
    pub fn with_rule(mut self, rule: RateLimitRule) -> Self {
        self.rules.insert(rule.action_type, rule);
        self
    }

    /// Returns the configured rule for an action type.
    #[must_use]
    pub fn rule_for(&self, action_type: ActionType) -> RateLimitRule {
        self.rules
            .get(&action_type)
            .cloned()
            .unwrap_or_else(|| {
                RateLimitRule::new(action_type, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MINUTES)
            })
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        let rules = ActionType::all()
            .iter()
            .map(|action_type| {
                (
                    *action_type,
                    RateLimitRule::new(*action_type, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MINUTES),
                )
            })
            .collect();

        Self { rules }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// A record annotated with its derived blocking state.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// The persisted record.
    pub record: RateLimitRecord,
    /// Whether the record currently denies attempts under the configured rule.
    pub is_blocked: bool,
    /// When the record's window ends under the configured rule.
    pub reset_at: DateTime<Utc>,
}

/// Application service for rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    repository: Arc<dyn RateLimitRepository>,
    policy: RateLimitPolicy,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>, policy: RateLimitPolicy) -> Self {
        Self { repository, policy }
    }

    /// Returns the configured rule for an action type.
    #[must_use]
    pub fn rule_for(&self, action_type: ActionType) -> RateLimitRule {
        self.policy.rule_for(action_type)
    }

    /// Checks whether the identifier may perform the rule's action.
    ///
    /// Records the attempt and returns the decision with the attempts left
    /// and the window reset time. Storage faults never deny legitimate
    /// callers: the check fails open with a full allowance, and the fault is
    /// logged for operator visibility.
    pub async fn check_rate_limit(
        &self,
        rule: &RateLimitRule,
        identifier: &str,
    ) -> AppResult<RateLimitDecision> {
        let identifier = NonEmptyString::new(identifier)?;

        let outcome = match self
            .repository
            .record_attempt(
                identifier.as_str(),
                rule.action_type,
                rule.max_attempts,
                rule.window_minutes,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    action_type = rule.action_type.as_str(),
                    error = %error,
                    "rate limit store unavailable, failing open"
                );
                return Ok(RateLimitDecision {
                    allowed: true,
                    remaining: rule.max_attempts,
                    reset_at: Utc::now(),
                });
            }
        };

        let reset_at = outcome.window_start + Duration::minutes(rule.window_minutes);

        if outcome.counted {
            Ok(RateLimitDecision {
                allowed: true,
                remaining: (rule.max_attempts - outcome.attempt_count).max(0),
                reset_at,
            })
        } else {
            Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            })
        }
    }

    /// Returns every record annotated with its blocking state under the
    /// configured per-action rule.
    pub async fn list_records(&self) -> AppResult<Vec<RateLimitStatus>> {
        let now = Utc::now();
        let records = self.repository.list().await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let rule = self.policy.rule_for(record.action_type);
                let is_blocked = record.is_blocked(now, rule.max_attempts, rule.window_minutes);
                let reset_at = record.window_end(rule.window_minutes);

                RateLimitStatus {
                    record,
                    is_blocked,
                    reset_at,
                }
            })
            .collect())
    }

    /// Clears one record's counter and restarts its window.
    pub async fn reset_record(&self, id: RateLimitRecordId) -> AppResult<()> {
        self.repository.reset(id).await
    }

    /// Removes one record so the identifier starts from a fresh window.
    pub async fn delete_record(&self, id: RateLimitRecordId) -> AppResult<()> {
        self.repository.delete(id).await
    }

    /// Removes every record unconditionally. Returns the removed count.
    pub async fn clear_all(&self) -> AppResult<u64> {
        self.repository.delete_all().await
    }

    /// Removes long-expired records. Intended for periodic cleanup.
    pub async fn cleanup(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::hours(24);
        self.repository.delete_expired(cutoff).await
    }
}

#[cfg(test)]
mod tests;
