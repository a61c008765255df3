use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::assessment::{EngineError, QuestionView};
use crate::response::{ok, AppError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitialParams {
    initial_difficulty: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    student_id: String,
    #[serde(default)]
    initial_params: InitialParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    session_id: String,
    current_difficulty: f64,
    /// `None` when the bank has nothing near the starting estimate.
    first_question: Option<QuestionView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAnswerRequest {
    question_id: String,
    answer: String,
    time_spent: f64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/:sessionId", get(get_result))
        .route("/:sessionId/next", get(next_question))
        .route("/:sessionId/answers", post(submit_answer))
        .route("/:sessionId/finish", post(finish_session))
}

async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let engine = state.placement();
    let session = engine.start(&payload.student_id, payload.initial_params.initial_difficulty)?;

    let first_question = match engine.next_question(&session.id) {
        Ok(question) => Some(question),
        Err(EngineError::NoQuestionAvailable { .. }) => None,
        Err(err) => return Err(err.into()),
    };

    Ok(ok(StartSessionResponse {
        session_id: session.id,
        current_difficulty: session.current_difficulty,
        first_question,
    }))
}

async fn next_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.placement().next_question(&session_id)?;
    Ok(ok(question))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let update = state.placement().submit_answer(
        &session_id,
        &payload.question_id,
        &payload.answer,
        payload.time_spent,
    )?;
    Ok(ok(update))
}

async fn finish_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.placement().finish_session(&session_id)?;
    Ok(ok(result))
}

async fn get_result(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.placement().get_result(&session_id)?;
    Ok(ok(result))
}
