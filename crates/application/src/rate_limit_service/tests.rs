use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use rihlah_core::{AppError, AppResult};
use rihlah_domain::{ActionType, RateLimitRecord, RateLimitRecordId};

use super::{
    AttemptOutcome, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MINUTES, RateLimitPolicy,
    RateLimitRepository, RateLimitRule, RateLimitService,
};

/// Repository fake replaying queued attempt outcomes.
#[derive(Default)]
struct ScriptedRepository {
    outcomes: Mutex<Vec<AttemptOutcome>>,
    records: Mutex<Vec<RateLimitRecord>>,
}

impl ScriptedRepository {
    fn with_outcome(counted: bool, attempt_count: i32, window_start: DateTime<Utc>) -> Self {
        let repository = Self::default();
        repository
            .outcomes
            .lock()
            .map(|mut outcomes| {
                outcomes.push(AttemptOutcome {
                    counted,
                    attempt_count,
                    window_start,
                })
            })
            .ok();
        repository
    }
}

#[async_trait]
impl RateLimitRepository for ScriptedRepository {
    async fn record_attempt(
        &self,
        _identifier: &str,
        _action_type: ActionType,
        _max_attempts: i32,
        _window_minutes: i64,
    ) -> AppResult<AttemptOutcome> {
        self.outcomes
            .lock()
            .map_err(|error| AppError::Internal(format!("failed to lock outcomes: {error}")))?
            .pop()
            .ok_or_else(|| AppError::Internal("no scripted outcome left".to_owned()))
    }

    async fn list(&self) -> AppResult<Vec<RateLimitRecord>> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|error| AppError::Internal(format!("failed to lock records: {error}")))
    }

    async fn reset(&self, _id: RateLimitRecordId) -> AppResult<()> {
        Ok(())
    }

    async fn delete(&self, _id: RateLimitRecordId) -> AppResult<()> {
        Ok(())
    }

    async fn delete_all(&self) -> AppResult<u64> {
        Ok(0)
    }

    async fn delete_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        Ok(0)
    }
}

/// Repository fake failing every operation, as an unreachable store would.
struct FailingRepository;

#[async_trait]
impl RateLimitRepository for FailingRepository {
    async fn record_attempt(
        &self,
        _identifier: &str,
        _action_type: ActionType,
        _max_attempts: i32,
        _window_minutes: i64,
    ) -> AppResult<AttemptOutcome> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn list(&self) -> AppResult<Vec<RateLimitRecord>> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn reset(&self, _id: RateLimitRecordId) -> AppResult<()> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn delete(&self, _id: RateLimitRecordId) -> AppResult<()> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn delete_all(&self) -> AppResult<u64> {
        Err(AppError::Internal("connection refused".to_owned()))
    }

    async fn delete_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        Err(AppError::Internal("connection refused".to_owned()))
    }
}

fn login_rule() -> RateLimitRule {
    RateLimitRule::new(ActionType::Login, 5, 15)
}

#[tokio::test]
async fn counted_attempt_is_allowed_with_decremented_remaining() {
    let window_start = Utc::now();
    let repository = Arc::new(ScriptedRepository::with_outcome(true, 1, window_start));
    let service = RateLimitService::new(repository, RateLimitPolicy::default());

    let decision = service.check_rate_limit(&login_rule(), "203.0.113.9").await;

    let Ok(decision) = decision else {
        panic!("check must succeed");
    };
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 4);
    assert_eq!(decision.reset_at, window_start + Duration::minutes(15));
}

#[tokio::test]
async fn uncounted_attempt_is_denied_with_zero_remaining() {
    let window_start = Utc::now() - Duration::minutes(2);
    let repository = Arc::new(ScriptedRepository::with_outcome(false, 5, window_start));
    let service = RateLimitService::new(repository, RateLimitPolicy::default());

    let decision = service.check_rate_limit(&login_rule(), "203.0.113.9").await;

    let Ok(decision) = decision else {
        panic!("check must succeed");
    };
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0);
    assert_eq!(decision.reset_at, window_start + Duration::minutes(15));
}

#[tokio::test]
async fn store_failure_fails_open_with_full_allowance() {
    let service = RateLimitService::new(Arc::new(FailingRepository), RateLimitPolicy::default());

    let before = Utc::now();
    let decision = service.check_rate_limit(&login_rule(), "203.0.113.9").await;

    let Ok(decision) = decision else {
        panic!("store faults must not surface to the caller");
    };
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 5);
    assert!(decision.reset_at >= before);
    assert!(decision.reset_at <= Utc::now());
}

#[tokio::test]
async fn empty_identifier_is_rejected_before_touching_the_store() {
    let service = RateLimitService::new(Arc::new(FailingRepository), RateLimitPolicy::default());

    let decision = service.check_rate_limit(&login_rule(), "  ").await;

    assert!(matches!(decision, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn list_records_derives_blocked_state_from_policy_rule() {
    let now = Utc::now();
    let repository = Arc::new(ScriptedRepository::default());

    let mut blocked = RateLimitRecord::first_attempt(
        "203.0.113.9",
        ActionType::Login,
        now - Duration::minutes(2),
    );
    blocked.attempt_count = 5;

    let mut expired = RateLimitRecord::first_attempt(
        "198.51.100.7",
        ActionType::Login,
        now - Duration::minutes(16),
    );
    expired.attempt_count = 5;

    repository
        .records
        .lock()
        .map(|mut records| {
            records.push(blocked.clone());
            records.push(expired.clone());
        })
        .ok();

    let service = RateLimitService::new(repository, RateLimitPolicy::default());
    let statuses = service.list_records().await.unwrap_or_default();

    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].is_blocked);
    assert_eq!(statuses[0].reset_at, blocked.window_start + Duration::minutes(15));
    assert!(!statuses[1].is_blocked);
}

#[test]
fn policy_defaults_to_five_attempts_per_quarter_hour() {
    let policy = RateLimitPolicy::default();
    let rule = policy.rule_for(ActionType::PasswordReset);

    assert_eq!(rule.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(rule.window_minutes, DEFAULT_WINDOW_MINUTES);
}

#[test]
fn overrides_replace_configured_thresholds() {
    let rule = login_rule().with_overrides(Some(3), Some(30));

    assert_eq!(rule.ok(), Some(RateLimitRule::new(ActionType::Login, 3, 30)));
}

#[test]
fn non_positive_overrides_are_rejected() {
    assert!(login_rule().with_overrides(Some(0), None).is_err());
    assert!(login_rule().with_overrides(None, Some(-15)).is_err());
}
