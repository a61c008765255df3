//! Placement test lifecycle: IN_PROGRESS -> COMPLETED, exactly once.
//!
//! A session always has at most one pending question. Only an answer to that
//! question is accepted, and accepting it clears the pending slot, so a
//! replayed or duplicated submission is rejected instead of counted twice.

use std::sync::Arc;

use chrono::Utc;

use super::config::{map_level, AssessmentConfig, LevelBand, TerminationParams};
use super::error::{EngineError, EngineResult};
use super::estimator::{AbilityEstimator, AbilityState};
use super::item_bank::ItemBank;
use super::store::{ExposureLog, SessionStore};
use super::types::{
    validate_time_spent, AnswerRecord, PlacementLevel, PlacementSession, Question, QuestionView,
    SessionResult, SessionStatus, SessionUpdate,
};
use crate::cache::{keys, TtlCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    MaxQuestions,
    Converged,
    FinishedEarly,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxQuestions => "max_questions",
            Self::Converged => "converged",
            Self::FinishedEarly => "finished_early",
        }
    }
}

pub struct PlacementEngine {
    estimator: AbilityEstimator,
    termination: TerminationParams,
    level_bands: Vec<LevelBand>,
    sessions: SessionStore,
    exposures: ExposureLog,
    items: Arc<dyn ItemBank>,
    results: TtlCache<SessionResult>,
}

impl PlacementEngine {
    pub fn new(
        config: &AssessmentConfig,
        items: Arc<dyn ItemBank>,
        results: TtlCache<SessionResult>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            estimator: AbilityEstimator::new(config.estimator.clone()),
            termination: config.termination.clone(),
            level_bands: config.level_bands.clone(),
            sessions: SessionStore::new(),
            exposures: ExposureLog::new(),
            items,
            results,
        })
    }

    pub fn start(
        &self,
        student_id: &str,
        initial_difficulty: Option<f64>,
    ) -> EngineResult<PlacementSession> {
        if student_id.trim().is_empty() {
            return Err(EngineError::invalid("studentId must not be empty"));
        }
        let params = self.estimator.params();
        let difficulty = initial_difficulty.unwrap_or(params.initial_difficulty);
        if !params.contains(difficulty) {
            return Err(EngineError::invalid(format!(
                "initial difficulty {difficulty} outside [{}, {}]",
                params.min_difficulty, params.max_difficulty
            )));
        }

        let ability = self.estimator.initial_state(difficulty);
        let session = PlacementSession {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            status: SessionStatus::InProgress,
            current_difficulty: ability.difficulty,
            step_size: ability.step_size,
            history: Vec::new(),
            final_level: None,
            started_at: Utc::now(),
            completed_at: None,
            pending: None,
        };
        self.sessions.insert(session.clone())?;

        tracing::info!(
            session_id = %session.id,
            student_id = %session.student_id,
            difficulty = session.current_difficulty,
            "placement session started"
        );
        Ok(session)
    }

    /// Returns the pending question if one is outstanding, otherwise draws
    /// the unseen item nearest the current estimate.
    pub fn next_question(&self, session_id: &str) -> EngineResult<QuestionView> {
        self.sessions.update(session_id, |session| {
            if session.is_completed() {
                return Err(EngineError::SessionCompleted(session.id.clone()));
            }
            if let Some(pending) = &session.pending {
                return Ok(QuestionView::from(pending));
            }
            let question = self.draw(session).ok_or(EngineError::NoQuestionAvailable {
                difficulty: session.current_difficulty,
                band: self.termination.selection_band,
            })?;
            let view = QuestionView::from(&question);
            session.pending = Some(question);
            Ok(view)
        })
    }

    pub fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &str,
        time_spent: f64,
    ) -> EngineResult<SessionUpdate> {
        validate_time_spent(time_spent)?;

        let (update, finished, student_id) = self.sessions.update(session_id, |session| {
            if session.is_completed() {
                return Err(EngineError::SessionCompleted(session.id.clone()));
            }
            let pending = match session.pending.take() {
                Some(q) if q.id == question_id => q,
                _ => {
                    return Err(EngineError::UnknownQuestion {
                        session_id: session.id.clone(),
                        question_id: question_id.to_string(),
                    })
                }
            };

            let correct = answer == pending.correct_answer;
            let before = AbilityState {
                difficulty: session.current_difficulty,
                step_size: session.step_size,
            };
            let after = self.estimator.update(before, correct);

            session.history.push(AnswerRecord {
                question_id: pending.id,
                difficulty_at_time: before.difficulty,
                correct,
                time_spent,
                step_after: after.step_size,
            });
            session.current_difficulty = after.difficulty;
            session.step_size = after.step_size;

            if let Some(reason) = self.termination_reason(session) {
                let final_level = self.complete(session, reason)?;
                let update = SessionUpdate::Completed {
                    final_level,
                    total_time: session.total_time(),
                };
                return Ok((update, Some(session.result()), session.student_id.clone()));
            }

            let update = match self.draw(session) {
                Some(next) => {
                    let view = QuestionView::from(&next);
                    session.pending = Some(next);
                    SessionUpdate::Next { next_question: view }
                }
                None => {
                    tracing::warn!(
                        session_id = %session.id,
                        difficulty = session.current_difficulty,
                        "item bank exhausted near current estimate"
                    );
                    SessionUpdate::Exhausted {
                        current_difficulty: session.current_difficulty,
                    }
                }
            };
            Ok((update, None, session.student_id.clone()))
        })?;
        self.exposures.record(&student_id, question_id);

        if let Some(result) = finished {
            self.results.set(keys::session_result_key(session_id), result);
        }
        Ok(update)
    }

    /// Ends an in-progress session with the current estimate, e.g. after the
    /// bank ran dry.
    pub fn finish_session(&self, session_id: &str) -> EngineResult<SessionResult> {
        let result = self.sessions.update(session_id, |session| {
            if session.is_completed() {
                return Err(EngineError::SessionCompleted(session.id.clone()));
            }
            session.pending = None;
            self.complete(session, TerminationReason::FinishedEarly)?;
            Ok(session.result())
        })?;
        self.results.set(keys::session_result_key(session_id), result.clone());
        Ok(result)
    }

    /// In-progress sessions yield a partial result without a final level.
    pub fn get_result(&self, session_id: &str) -> EngineResult<SessionResult> {
        let key = keys::session_result_key(session_id);
        if let Some(result) = self.results.get(&key) {
            return Ok(result);
        }
        let result = self.sessions.snapshot(session_id)?.result();
        if result.status == SessionStatus::Completed {
            self.results.set(key, result.clone());
        }
        Ok(result)
    }

    pub fn session(&self, session_id: &str) -> EngineResult<PlacementSession> {
        self.sessions.snapshot(session_id)
    }

    pub fn level_for(&self, difficulty: f64) -> EngineResult<PlacementLevel> {
        map_level(&self.level_bands, difficulty).ok_or_else(|| {
            EngineError::invalid(format!("no level band covers difficulty {difficulty}"))
        })
    }

    /// Excludes items from this session and any item the student answered
    /// in an earlier session.
    fn draw(&self, session: &PlacementSession) -> Option<Question> {
        let mut seen = self.exposures.seen_by(&session.student_id);
        seen.extend(session.seen_question_ids());
        self.items.nearest_unseen(
            &session.student_id,
            session.current_difficulty,
            self.termination.selection_band,
            &seen,
        )
    }

    fn termination_reason(&self, session: &PlacementSession) -> Option<TerminationReason> {
        if session.history.len() >= self.termination.max_questions {
            return Some(TerminationReason::MaxQuestions);
        }
        let k = self.termination.convergence_window;
        if session.history.len() >= k
            && session.history[session.history.len() - k..]
                .iter()
                .all(|r| r.step_after < self.termination.convergence_epsilon)
        {
            return Some(TerminationReason::Converged);
        }
        None
    }

    fn complete(
        &self,
        session: &mut PlacementSession,
        reason: TerminationReason,
    ) -> EngineResult<PlacementLevel> {
        let level = self.level_for(session.current_difficulty)?;
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        session.final_level = Some(level.clone());

        tracing::info!(
            session_id = %session.id,
            student_id = %session.student_id,
            reason = reason.as_str(),
            questions = session.history.len(),
            difficulty = session.current_difficulty,
            level = %level,
            "placement session completed"
        );
        Ok(level)
    }
}
