use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};
use super::types::{LevelPosition, MasteryLevel, PlacementLevel};

const BOUNDARY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorParams {
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub initial_difficulty: f64,
    pub initial_step: f64,
    pub decay_factor: f64,
    pub min_step: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            min_difficulty: 0.0,
            max_difficulty: 10.0,
            initial_difficulty: 5.0,
            initial_step: 2.0,
            decay_factor: 0.7,
            min_step: 0.1,
        }
    }
}

impl EstimatorParams {
    pub fn contains(&self, difficulty: f64) -> bool {
        difficulty.is_finite() && difficulty >= self.min_difficulty && difficulty <= self.max_difficulty
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminationParams {
    pub max_questions: usize,
    pub convergence_window: usize,
    pub convergence_epsilon: f64,
    /// Maximum |item difficulty - estimate| the bank may return.
    pub selection_band: f64,
}

impl Default for TerminationParams {
    fn default() -> Self {
        Self {
            max_questions: 20,
            convergence_window: 3,
            convergence_epsilon: 0.25,
            selection_band: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelBand {
    pub lower: f64,
    pub upper: f64,
    pub level: PlacementLevel,
}

impl LevelBand {
    pub fn contains(&self, difficulty: f64) -> bool {
        difficulty >= self.lower - BOUNDARY_EPSILON && difficulty <= self.upper + BOUNDARY_EPSILON
    }
}

/// Splits `[min, max]` evenly into BELOW/AT/ABOVE bands for each grade band, in order.
pub fn uniform_level_bands(min: f64, max: f64, grade_bands: &[&str]) -> Vec<LevelBand> {
    let count = grade_bands.len() * LevelPosition::ALL.len();
    if count == 0 {
        return Vec::new();
    }
    let width = (max - min) / count as f64;

    grade_bands
        .iter()
        .flat_map(|grade| LevelPosition::ALL.into_iter().map(move |pos| (*grade, pos)))
        .enumerate()
        .map(|(i, (grade, position))| LevelBand {
            lower: min + width * i as f64,
            upper: if i + 1 == count { max } else { min + width * (i + 1) as f64 },
            level: PlacementLevel::new(position, grade),
        })
        .collect()
}

/// First band containing `difficulty` wins, so a value on a shared boundary
/// lands in the lower band.
pub fn map_level(bands: &[LevelBand], difficulty: f64) -> Option<PlacementLevel> {
    bands
        .iter()
        .find(|band| band.contains(difficulty))
        .map(|band| band.level.clone())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryThresholds {
    pub novice: u32,
    pub practicing: u32,
    pub competent: u32,
    pub proficient: u32,
}

impl Default for MasteryThresholds {
    fn default() -> Self {
        Self {
            novice: 3,
            practicing: 3,
            competent: 4,
            proficient: 5,
        }
    }
}

impl MasteryThresholds {
    /// Streak needed to leave `level`; `None` for the terminal level.
    pub fn for_level(&self, level: MasteryLevel) -> Option<u32> {
        match level {
            MasteryLevel::Novice => Some(self.novice),
            MasteryLevel::Practicing => Some(self.practicing),
            MasteryLevel::Competent => Some(self.competent),
            MasteryLevel::Proficient => Some(self.proficient),
            MasteryLevel::Expert => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "camelCase")]
pub enum DemotionPolicy {
    #[default]
    Never,
    #[serde(rename_all = "camelCase")]
    AfterConsecutiveFailures { failures: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryParams {
    pub pass_threshold: f64,
    pub thresholds: MasteryThresholds,
    pub demotion: DemotionPolicy,
    pub max_write_retries: u32,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            pass_threshold: 85.0,
            thresholds: MasteryThresholds::default(),
            demotion: DemotionPolicy::Never,
            max_write_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewBucket {
    pub min_strength: f64,
    pub interval_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewParams {
    /// Sorted by `min_strength`; the last bucket whose floor is met applies.
    pub buckets: Vec<ReviewBucket>,
    pub failure_interval_days: i64,
}

impl Default for ReviewParams {
    fn default() -> Self {
        Self {
            buckets: vec![
                ReviewBucket { min_strength: 0.0, interval_days: 1 },
                ReviewBucket { min_strength: 0.6, interval_days: 3 },
                ReviewBucket { min_strength: 0.8, interval_days: 7 },
                ReviewBucket { min_strength: 0.9, interval_days: 14 },
            ],
            failure_interval_days: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    pub jitter_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 5 * 60,
            jitter_ratio: 0.1,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentConfig {
    pub estimator: EstimatorParams,
    pub termination: TerminationParams,
    pub level_bands: Vec<LevelBand>,
    pub mastery: MasteryParams,
    pub review: ReviewParams,
    pub cache: CacheConfig,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        let estimator = EstimatorParams::default();
        let level_bands = uniform_level_bands(
            estimator.min_difficulty,
            estimator.max_difficulty,
            &["K-2", "3-5", "6-8"],
        );
        Self {
            estimator,
            termination: TerminationParams::default(),
            level_bands,
            mastery: MasteryParams::default(),
            review: ReviewParams::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AssessmentConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse::<usize>("ASSESSMENT_MAX_QUESTIONS") {
            config.termination.max_questions = val;
        }
        if let Some(val) = env_parse::<f64>("ASSESSMENT_DECAY_FACTOR") {
            config.estimator.decay_factor = val;
        }
        if let Some(val) = env_parse::<f64>("ASSESSMENT_INITIAL_STEP") {
            config.estimator.initial_step = val;
        }
        if let Some(val) = env_parse::<f64>("ASSESSMENT_MIN_STEP") {
            config.estimator.min_step = val;
        }
        if let Some(val) = env_parse::<f64>("ASSESSMENT_CONVERGENCE_EPSILON") {
            config.termination.convergence_epsilon = val;
        }
        if let Some(val) = env_parse::<f64>("MASTERY_PASS_THRESHOLD") {
            config.mastery.pass_threshold = val;
        }
        if let Some(val) = env_parse::<u32>("MASTERY_DEMOTE_AFTER_FAILURES") {
            config.mastery.demotion = if val == 0 {
                DemotionPolicy::Never
            } else {
                DemotionPolicy::AfterConsecutiveFailures { failures: val }
            };
        }
        if let Some(val) = env_parse::<u64>("CACHE_TTL_SECS") {
            config.cache.ttl_secs = val;
        }
        if let Some(val) = env_parse::<usize>("CACHE_CAPACITY") {
            config.cache.capacity = val;
        }

        config
    }

    pub fn validate(&self) -> EngineResult<()> {
        let e = &self.estimator;
        if !(e.min_difficulty.is_finite() && e.max_difficulty.is_finite())
            || e.min_difficulty >= e.max_difficulty
        {
            return Err(EngineError::invalid("difficulty domain must be a non-empty finite range"));
        }
        if !e.contains(e.initial_difficulty) {
            return Err(EngineError::invalid("initial difficulty outside the domain"));
        }
        if !(e.decay_factor > 0.0 && e.decay_factor < 1.0) {
            return Err(EngineError::invalid("decay factor must lie in (0, 1)"));
        }
        if !(e.min_step > 0.0 && e.min_step.is_finite()) {
            return Err(EngineError::invalid("min step must be positive"));
        }
        if !(e.initial_step >= e.min_step && e.initial_step.is_finite()) {
            return Err(EngineError::invalid("initial step must be at least min step"));
        }

        let t = &self.termination;
        if t.max_questions == 0 {
            return Err(EngineError::invalid("max questions must be positive"));
        }
        if t.convergence_window == 0 {
            return Err(EngineError::invalid("convergence window must be positive"));
        }
        if !(t.selection_band >= 0.0 && t.selection_band.is_finite()) {
            return Err(EngineError::invalid("selection band must be non-negative"));
        }

        self.validate_level_bands()?;

        let m = &self.mastery;
        if !(0.0..=100.0).contains(&m.pass_threshold) {
            return Err(EngineError::invalid("pass threshold must lie in 0-100"));
        }
        if MasteryLevel::ALL
            .iter()
            .filter_map(|level| m.thresholds.for_level(*level))
            .any(|threshold| threshold == 0)
        {
            return Err(EngineError::invalid("advancement thresholds must be positive"));
        }
        if let DemotionPolicy::AfterConsecutiveFailures { failures: 0 } = m.demotion {
            return Err(EngineError::invalid("demotion failure count must be positive"));
        }

        let r = &self.review;
        if r.failure_interval_days < 1 {
            return Err(EngineError::invalid("failure review interval must be at least one day"));
        }
        match r.buckets.first() {
            Some(first) if first.min_strength <= 0.0 => {
                if r.failure_interval_days > first.interval_days {
                    return Err(EngineError::invalid(
                        "failure review interval must not exceed the weakest bucket",
                    ));
                }
            }
            _ => return Err(EngineError::invalid("review buckets must start at strength 0")),
        }
        if r.buckets.iter().any(|b| b.interval_days < 1) {
            return Err(EngineError::invalid("review intervals must be at least one day"));
        }
        if r.buckets.windows(2).any(|w| w[0].min_strength >= w[1].min_strength) {
            return Err(EngineError::invalid("review buckets must be sorted by strength"));
        }

        Ok(())
    }

    fn validate_level_bands(&self) -> EngineResult<()> {
        let bands = &self.level_bands;
        let (Some(first), Some(last)) = (bands.first(), bands.last()) else {
            return Err(EngineError::invalid("level band table is empty"));
        };
        if first.lower > self.estimator.min_difficulty + BOUNDARY_EPSILON
            || last.upper < self.estimator.max_difficulty - BOUNDARY_EPSILON
        {
            return Err(EngineError::invalid("level bands must cover the difficulty domain"));
        }
        if bands.iter().any(|b| b.lower > b.upper) {
            return Err(EngineError::invalid("level band lower bound exceeds upper bound"));
        }
        if bands
            .windows(2)
            .any(|w| w[1].lower > w[0].upper + BOUNDARY_EPSILON || w[1].lower < w[0].lower)
        {
            return Err(EngineError::invalid("level bands must be sorted and contiguous"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.trim().parse().ok())
}
