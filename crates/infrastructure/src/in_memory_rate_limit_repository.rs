//! In-memory rate limit repository for tests and local development.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rihlah_application::{AttemptOutcome, RateLimitRepository};
use rihlah_core::{AppError, AppResult};
use rihlah_domain::{ActionType, RateLimitRecord, RateLimitRecordId};

/// Rate limit repository keeping counters in a process-local map.
#[derive(Default)]
pub struct InMemoryRateLimitRepository {
    records: RwLock<HashMap<(String, ActionType), RateLimitRecord>>,
}

impl InMemoryRateLimitRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn record_attempt(
        &self,
        identifier: &str,
        action_type: ActionType,
        max_attempts: i32,
        window_minutes: i64,
    ) -> AppResult<AttemptOutcome> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        match records.entry((identifier.to_owned(), action_type)) {
            Entry::Vacant(slot) => {
                let record = slot.insert(RateLimitRecord::first_attempt(
                    identifier,
                    action_type,
                    now,
                ));
                Ok(AttemptOutcome {
                    counted: true,
                    attempt_count: record.attempt_count,
                    window_start: record.window_start,
                })
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                let counted = record.register_attempt(now, max_attempts, window_minutes);
                Ok(AttemptOutcome {
                    counted,
                    attempt_count: record.attempt_count,
                    window_start: record.window_start,
                })
            }
        }
    }

    async fn list(&self) -> AppResult<Vec<RateLimitRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<RateLimitRecord> = records.values().cloned().collect();
        all.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
        Ok(all)
    }

    async fn reset(&self, id: RateLimitRecordId) -> AppResult<()> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| {
                AppError::NotFound(format!("rate limit record '{id}' does not exist"))
            })?;

        record.reset(now);
        Ok(())
    }

    async fn delete(&self, id: RateLimitRecordId) -> AppResult<()> {
        let mut records = self.records.write().await;
        let key = records
            .iter()
            .find(|(_, record)| record.id == id)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| {
                AppError::NotFound(format!("rate limit record '{id}' does not exist"))
            })?;

        records.remove(&key);
        Ok(())
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let initial = records.len();
        records.retain(|_, record| record.window_start >= before);
        Ok((initial - records.len()) as u64)
    }
}
