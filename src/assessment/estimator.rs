//! Damped bisection-style ability estimator.
//!
//! Each answer moves the estimate by the current step (up when correct, down
//! when wrong), then the step decays geometrically toward `min_step`. The
//! estimate is clamped to the configured difficulty domain.

use serde::{Deserialize, Serialize};

use super::config::EstimatorParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityState {
    pub difficulty: f64,
    pub step_size: f64,
}

#[derive(Debug, Clone)]
pub struct AbilityEstimator {
    params: EstimatorParams,
}

impl AbilityEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    pub fn initial_state(&self, difficulty: f64) -> AbilityState {
        AbilityState {
            difficulty: self.clamp(difficulty),
            step_size: self.params.initial_step,
        }
    }

    pub fn update(&self, current: AbilityState, correct: bool) -> AbilityState {
        let delta = if correct { current.step_size } else { -current.step_size };
        let difficulty = self.clamp(current.difficulty + delta);

        // min() keeps a step that started below the floor from growing back.
        let decayed = current.step_size * self.params.decay_factor;
        let step_size = decayed.max(self.params.min_step).min(current.step_size);

        tracing::debug!(
            from = current.difficulty,
            to = difficulty,
            step = step_size,
            correct,
            "ability estimate updated"
        );

        AbilityState {
            difficulty,
            step_size,
        }
    }

    fn clamp(&self, difficulty: f64) -> f64 {
        difficulty.clamp(self.params.min_difficulty, self.params.max_difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(decay: f64, min_step: f64) -> AbilityEstimator {
        AbilityEstimator::new(EstimatorParams {
            min_difficulty: 0.0,
            max_difficulty: 10.0,
            initial_difficulty: 5.0,
            initial_step: 2.0,
            decay_factor: decay,
            min_step,
        })
    }

    #[test]
    fn test_five_correct_answers_halve_the_step() {
        let est = estimator(0.5, 0.01);
        let mut state = est.initial_state(5.0);
        let mut trail = vec![state.difficulty];
        for _ in 0..5 {
            state = est.update(state, true);
            trail.push(state.difficulty);
        }
        let expected = [5.0, 7.0, 8.0, 8.5, 8.75, 8.875];
        for (got, want) in trail.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_wrong_answer_moves_down() {
        let est = estimator(0.7, 0.1);
        let state = est.update(est.initial_state(5.0), false);
        assert!((state.difficulty - 3.0).abs() < 1e-9);
        assert!((state.step_size - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_clamped_at_domain_edges() {
        let est = estimator(0.9, 0.5);
        let mut state = est.initial_state(9.5);
        for _ in 0..10 {
            state = est.update(state, true);
            assert!(state.difficulty <= 10.0);
        }
        assert_eq!(state.difficulty, 10.0);

        let mut state = est.initial_state(0.5);
        for _ in 0..10 {
            state = est.update(state, false);
            assert!(state.difficulty >= 0.0);
        }
        assert_eq!(state.difficulty, 0.0);
    }

    #[test]
    fn test_step_floors_at_min_step() {
        let est = estimator(0.5, 0.3);
        let mut state = est.initial_state(5.0);
        for i in 0..20 {
            state = est.update(state, i % 2 == 0);
        }
        assert!((state.step_size - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_initial_state_clamps_difficulty() {
        let est = estimator(0.5, 0.1);
        assert_eq!(est.initial_state(12.0).difficulty, 10.0);
        assert_eq!(est.initial_state(2.0).step_size, 2.0);
    }
}
