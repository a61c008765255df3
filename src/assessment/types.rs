use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelPosition {
    Below,
    At,
    Above,
}

impl LevelPosition {
    pub const ALL: [LevelPosition; 3] = [Self::Below, Self::At, Self::Above];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Below => "BELOW",
            Self::At => "AT",
            Self::Above => "ABOVE",
        }
    }
}

/// Discrete placement outcome: a position relative to a grade band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementLevel {
    pub position: LevelPosition,
    pub grade_band: String,
}

impl PlacementLevel {
    pub fn new(position: LevelPosition, grade_band: impl Into<String>) -> Self {
        Self {
            position,
            grade_band: grade_band.into(),
        }
    }
}

impl std::fmt::Display for PlacementLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.position.as_str(), self.grade_band)
    }
}

/// A bank item as the engine sees it. `correct_answer` never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub difficulty: f64,
    #[serde(default)]
    pub topic: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub choices: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub difficulty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub prompt: String,
    pub choices: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            difficulty: question.difficulty,
            topic: question.topic.clone(),
            prompt: question.prompt.clone(),
            choices: question.choices.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    pub difficulty_at_time: f64,
    pub correct: bool,
    pub time_spent: f64,
    /// Step size left after this answer was applied.
    pub step_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSession {
    pub id: String,
    pub student_id: String,
    pub status: SessionStatus,
    pub current_difficulty: f64,
    pub step_size: f64,
    pub history: Vec<AnswerRecord>,
    pub final_level: Option<PlacementLevel>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Last issued, not yet answered question.
    pub pending: Option<Question>,
}

impl PlacementSession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn total_time(&self) -> f64 {
        self.history.iter().map(|r| r.time_spent).sum()
    }

    pub fn seen_question_ids(&self) -> HashSet<String> {
        self.history
            .iter()
            .map(|r| r.question_id.clone())
            .chain(self.pending.iter().map(|q| q.id.clone()))
            .collect()
    }

    pub fn result(&self) -> SessionResult {
        let completed = self.is_completed();
        SessionResult {
            session_id: self.id.clone(),
            student_id: self.student_id.clone(),
            status: self.status,
            final_level: self.final_level.clone(),
            total_time: completed.then(|| self.total_time()),
            questions_answered: self.history.len(),
            current_difficulty: self.current_difficulty,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: String,
    pub student_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_level: Option<PlacementLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<f64>,
    pub questions_answered: usize,
    pub current_difficulty: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionUpdate {
    #[serde(rename_all = "camelCase")]
    Next { next_question: QuestionView },
    #[serde(rename_all = "camelCase")]
    Completed {
        final_level: PlacementLevel,
        total_time: f64,
    },
    /// The answer was recorded but the bank has nothing left in the band.
    #[serde(rename_all = "camelCase")]
    Exhausted { current_difficulty: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasteryLevel {
    Novice,
    Practicing,
    Competent,
    Proficient,
    Expert,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 5] = [
        Self::Novice,
        Self::Practicing,
        Self::Competent,
        Self::Proficient,
        Self::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novice => "NOVICE",
            Self::Practicing => "PRACTICING",
            Self::Competent => "COMPETENT",
            Self::Proficient => "PROFICIENT",
            Self::Expert => "EXPERT",
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Novice => Some(Self::Practicing),
            Self::Practicing => Some(Self::Competent),
            Self::Competent => Some(Self::Proficient),
            Self::Proficient => Some(Self::Expert),
            Self::Expert => None,
        }
    }

    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::Novice => None,
            Self::Practicing => Some(Self::Novice),
            Self::Competent => Some(Self::Practicing),
            Self::Proficient => Some(Self::Competent),
            Self::Expert => Some(Self::Proficient),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRecord {
    pub student_id: String,
    pub skill_id: String,
    pub current_level: MasteryLevel,
    pub consecutive_successes: u32,
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_attempt_date: Option<DateTime<Utc>>,
    pub next_review_date: Option<DateTime<Utc>>,
    /// Bumped on every successful write; used for compare-and-swap.
    #[serde(default)]
    pub version: u64,
}

impl MasteryRecord {
    pub fn new(student_id: impl Into<String>, skill_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            skill_id: skill_id.into(),
            current_level: MasteryLevel::Novice,
            consecutive_successes: 0,
            consecutive_failures: 0,
            last_attempt_date: None,
            next_review_date: None,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryAttempt {
    pub score: f64,
    pub time_spent: f64,
    #[serde(default)]
    pub errors: BTreeSet<String>,
    pub completed_at: DateTime<Utc>,
}

impl MasteryAttempt {
    pub fn new(score: f64, time_spent: f64, completed_at: DateTime<Utc>) -> Self {
        Self {
            score,
            time_spent,
            errors: BTreeSet::new(),
            completed_at,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.score.is_finite() || !(0.0..=100.0).contains(&self.score) {
            return Err(EngineError::invalid(format!(
                "score must be within 0-100, got {}",
                self.score
            )));
        }
        validate_time_spent(self.time_spent)
    }
}

pub(crate) fn validate_time_spent(time_spent: f64) -> EngineResult<()> {
    if !time_spent.is_finite() || time_spent < 0.0 {
        return Err(EngineError::invalid(format!(
            "timeSpent must be a non-negative number of seconds, got {time_spent}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mastery_level_total_order() {
        for pair in MasteryLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].previous(), Some(pair[0]));
        }
        assert!(MasteryLevel::Expert.is_terminal());
        assert_eq!(MasteryLevel::Novice.previous(), None);
    }

    #[test]
    fn test_mastery_level_wire_format() {
        let json = serde_json::to_string(&MasteryLevel::Proficient).unwrap();
        assert_eq!(json, "\"PROFICIENT\"");
        let status = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(status, "\"IN_PROGRESS\"");
    }

    #[test]
    fn test_question_view_hides_answer() {
        let question = Question {
            id: "q1".into(),
            difficulty: 4.0,
            topic: None,
            prompt: "2 + 2".into(),
            choices: vec!["3".into(), "4".into()],
            correct_answer: "4".into(),
        };
        let json = serde_json::to_value(QuestionView::from(&question)).unwrap();
        assert!(json.get("correctAnswer").is_none());
        assert_eq!(json["id"], "q1");
    }

    #[test]
    fn test_session_update_tagging() {
        let update = SessionUpdate::Completed {
            final_level: PlacementLevel::new(LevelPosition::At, "3-5"),
            total_time: 42.5,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["kind"], "completed");
        assert_eq!(json["finalLevel"]["position"], "AT");
        assert_eq!(json["totalTime"], 42.5);
        let back: SessionUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn test_next_update_carries_next_question() {
        let question = Question {
            id: "q7".into(),
            difficulty: 4.5,
            topic: None,
            prompt: "12 / 4".into(),
            choices: Vec::new(),
            correct_answer: "3".into(),
        };
        let update = SessionUpdate::Next {
            next_question: QuestionView::from(&question),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["kind"], "next");
        assert_eq!(json["nextQuestion"]["id"], "q7");
        assert!(json.get("question").is_none());
        assert!(json["nextQuestion"].get("correctAnswer").is_none());
    }

    #[test]
    fn test_attempt_validation() {
        let now = Utc::now();
        assert!(MasteryAttempt::new(85.0, 30.0, now).validate().is_ok());
        assert!(MasteryAttempt::new(100.5, 30.0, now).validate().is_err());
        assert!(MasteryAttempt::new(-1.0, 30.0, now).validate().is_err());
        assert!(MasteryAttempt::new(f64::NAN, 30.0, now).validate().is_err());
        assert!(MasteryAttempt::new(50.0, -0.1, now).validate().is_err());
    }
}
