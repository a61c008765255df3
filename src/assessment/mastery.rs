//! Per-(student, skill) mastery progression.
//!
//! Passing attempts grow a streak; meeting the level's threshold advances one
//! level and resets the streak. A failing attempt resets the streak and, only
//! when a demotion policy is configured, may drop one level.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::config::{DemotionPolicy, MasteryParams, ReviewParams};
use super::error::{EngineError, EngineResult};
use super::scheduler::ReviewScheduler;
use super::store::MasteryStore;
use super::types::{MasteryAttempt, MasteryRecord};
use crate::cache::{keys, TtlCache};

#[derive(Debug, Clone)]
pub struct MasteryTracker {
    params: MasteryParams,
    scheduler: ReviewScheduler,
}

impl MasteryTracker {
    pub fn new(params: MasteryParams, review: ReviewParams) -> Self {
        let scheduler = ReviewScheduler::new(review, params.thresholds.clone());
        Self { params, scheduler }
    }

    pub fn params(&self) -> &MasteryParams {
        &self.params
    }

    pub fn scheduler(&self) -> &ReviewScheduler {
        &self.scheduler
    }

    pub fn record_attempt(
        &self,
        record: &MasteryRecord,
        attempt: &MasteryAttempt,
    ) -> EngineResult<MasteryRecord> {
        self.record_attempt_with(record, attempt, self.params.pass_threshold)
    }

    pub fn record_attempt_with(
        &self,
        record: &MasteryRecord,
        attempt: &MasteryAttempt,
        pass_threshold: f64,
    ) -> EngineResult<MasteryRecord> {
        attempt.validate()?;
        if !(0.0..=100.0).contains(&pass_threshold) {
            return Err(EngineError::invalid(format!(
                "pass threshold must lie in 0-100, got {pass_threshold}"
            )));
        }

        let success = attempt.score >= pass_threshold;
        let mut next = record.clone();

        if success {
            next.consecutive_failures = 0;
            next.consecutive_successes = next.consecutive_successes.saturating_add(1);
            let threshold = self.params.thresholds.for_level(next.current_level);
            if let (Some(threshold), Some(promoted)) = (threshold, next.current_level.next()) {
                if next.consecutive_successes >= threshold {
                    tracing::info!(
                        student_id = %next.student_id,
                        skill_id = %next.skill_id,
                        from = next.current_level.as_str(),
                        to = promoted.as_str(),
                        "mastery level advanced"
                    );
                    next.current_level = promoted;
                    next.consecutive_successes = 0;
                }
            }
        } else {
            next.consecutive_successes = 0;
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            if let DemotionPolicy::AfterConsecutiveFailures { failures } = self.params.demotion {
                if next.consecutive_failures >= failures {
                    if let Some(demoted) = next.current_level.previous() {
                        tracing::info!(
                            student_id = %next.student_id,
                            skill_id = %next.skill_id,
                            from = next.current_level.as_str(),
                            to = demoted.as_str(),
                            "mastery level demoted"
                        );
                        next.current_level = demoted;
                    }
                    next.consecutive_failures = 0;
                }
            }
        }

        next.last_attempt_date = Some(attempt.completed_at);
        next.next_review_date = Some(self.scheduler.schedule(
            next.current_level,
            next.consecutive_successes,
            success,
            attempt.completed_at,
        ));
        Ok(next)
    }
}

/// Read-modify-write front for mastery records. Each attempt is applied to
/// the freshly loaded record and written back with compare-and-swap; a stale
/// write is re-fetched and recomputed up to `max_write_retries` times.
pub struct MasteryService {
    tracker: MasteryTracker,
    store: Arc<dyn MasteryStore>,
    cache: TtlCache<MasteryRecord>,
}

impl MasteryService {
    pub fn new(
        tracker: MasteryTracker,
        store: Arc<dyn MasteryStore>,
        cache: TtlCache<MasteryRecord>,
    ) -> Self {
        Self {
            tracker,
            store,
            cache,
        }
    }

    pub fn tracker(&self) -> &MasteryTracker {
        &self.tracker
    }

    pub fn record_attempt(
        &self,
        student_id: &str,
        skill_id: &str,
        attempt: &MasteryAttempt,
    ) -> EngineResult<MasteryRecord> {
        validate_ids(student_id, skill_id)?;
        attempt.validate()?;

        let max_retries = self.tracker.params().max_write_retries;
        for retry in 0..=max_retries {
            let current = self.store.load(student_id, skill_id)?;
            let expected_version = current.as_ref().map(|r| r.version);
            let base = current.unwrap_or_else(|| MasteryRecord::new(student_id, skill_id));
            let next = self.tracker.record_attempt(&base, attempt)?;

            match self.store.compare_and_swap(&next, expected_version) {
                Ok(stored) => {
                    self.cache_record(&stored);
                    tracing::debug!(
                        student_id,
                        skill_id,
                        level = stored.current_level.as_str(),
                        streak = stored.consecutive_successes,
                        version = stored.version,
                        "mastery attempt recorded"
                    );
                    return Ok(stored);
                }
                Err(err) if err.is_retryable() => {
                    tracing::debug!(student_id, skill_id, retry, error = %err, "stale mastery write, retrying");
                    if retry < max_retries {
                        std::thread::sleep(retry_backoff(retry));
                    }
                }
                Err(err) => return Err(err),
            }
        }

        tracing::warn!(student_id, skill_id, max_retries, "mastery write retries exhausted");
        Err(EngineError::Conflict(format!(
            "mastery record {student_id}/{skill_id} kept changing; re-fetch and retry"
        )))
    }

    pub fn get(&self, student_id: &str, skill_id: &str) -> EngineResult<MasteryRecord> {
        validate_ids(student_id, skill_id)?;
        let key = keys::mastery_key(student_id, skill_id);
        if let Some(record) = self.cache.get(&key) {
            return Ok(record);
        }
        let record = self
            .store
            .load(student_id, skill_id)?
            .ok_or_else(|| EngineError::RecordNotFound {
                student_id: student_id.to_string(),
                skill_id: skill_id.to_string(),
            })?;
        self.cache_record(&record);
        Ok(record)
    }

    /// Caches `record` unless a newer version is already cached. Writers and
    /// readers fill the cache after releasing the store, so arrival order at
    /// the cache says nothing about commit order.
    fn cache_record(&self, record: &MasteryRecord) {
        let key = keys::mastery_key(&record.student_id, &record.skill_id);
        self.cache
            .set_if(key, record.clone(), |cached| cached.version < record.version);
    }
}

/// Exponential pause between compare-and-swap attempts, jittered so that
/// contending writers spread out.
fn retry_backoff(retry: u32) -> Duration {
    let base_ms = (2u64 << retry.min(4)) as f64;
    let factor = rand::rng().random_range(0.5..=1.5);
    Duration::from_micros((base_ms * factor * 1000.0).round() as u64)
}

fn validate_ids(student_id: &str, skill_id: &str) -> EngineResult<()> {
    if student_id.trim().is_empty() || skill_id.trim().is_empty() {
        return Err(EngineError::invalid("studentId and skillId must not be empty"));
    }
    Ok(())
}
