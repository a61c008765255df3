use chrono::{DateTime, Duration, Utc};

use super::config::{MasteryThresholds, ReviewParams};
use super::types::MasteryLevel;

/// Maps mastery strength to the next review date.
///
/// Strength is `consecutive_successes / threshold(level)`, clamped to `[0, 1]`;
/// the terminal level counts as full strength. A failed attempt always uses
/// the failure interval.
#[derive(Debug, Clone)]
pub struct ReviewScheduler {
    params: ReviewParams,
    thresholds: MasteryThresholds,
}

impl ReviewScheduler {
    pub fn new(params: ReviewParams, thresholds: MasteryThresholds) -> Self {
        Self { params, thresholds }
    }

    pub fn strength(&self, level: MasteryLevel, consecutive_successes: u32) -> f64 {
        match self.thresholds.for_level(level) {
            Some(threshold) if threshold > 0 => {
                (consecutive_successes as f64 / threshold as f64).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    pub fn interval_days(&self, level: MasteryLevel, consecutive_successes: u32, success: bool) -> i64 {
        if !success {
            return self.params.failure_interval_days.max(1);
        }
        let strength = self.strength(level, consecutive_successes);
        self.params
            .buckets
            .iter()
            .rev()
            .find(|bucket| strength >= bucket.min_strength)
            .map(|bucket| bucket.interval_days)
            .unwrap_or(self.params.failure_interval_days)
            .max(1)
    }

    pub fn schedule(
        &self,
        level: MasteryLevel,
        consecutive_successes: u32,
        success: bool,
        from: DateTime<Utc>,
    ) -> DateTime<Utc> {
        from + Duration::days(self.interval_days(level, consecutive_successes, success))
    }
}

impl Default for ReviewScheduler {
    fn default() -> Self {
        Self::new(ReviewParams::default(), MasteryThresholds::default())
    }
}
