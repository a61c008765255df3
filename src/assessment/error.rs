use thiserror::Error;

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameters,
    NotFound,
    Conflict,
    Exhausted,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("mastery record not found for student {student_id}, skill {skill_id}")]
    RecordNotFound { student_id: String, skill_id: String },
    #[error("session already completed: {0}")]
    SessionCompleted(String),
    #[error("question {question_id} is not the pending question of session {session_id}")]
    UnknownQuestion {
        session_id: String,
        question_id: String,
    },
    #[error("concurrent update conflict: {0}")]
    Conflict(String),
    #[error("no question available near difficulty {difficulty:.3} (band {band:.3})")]
    NoQuestionAvailable { difficulty: f64, band: f64 },
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::SessionNotFound(_) | Self::RecordNotFound { .. } => ErrorKind::NotFound,
            Self::SessionCompleted(_) | Self::UnknownQuestion { .. } | Self::Conflict(_) => {
                ErrorKind::Conflict
            }
            Self::NoQuestionAvailable { .. } => ErrorKind::Exhausted,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Only stale writes can succeed on a re-fetch; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
