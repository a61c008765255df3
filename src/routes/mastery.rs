use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::{MasteryAttempt, MasteryLevel};
use crate::response::{ok, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAttemptRequest {
    student_id: String,
    skill_id: String,
    score: f64,
    time_spent: f64,
    #[serde(default)]
    errors: BTreeSet<String>,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAttemptResponse {
    current_level: MasteryLevel,
    consecutive_successes: u32,
    next_review_date: Option<DateTime<Utc>>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attempts", post(submit_attempt))
        .route("/:studentId/:skillId", get(get_record))
}

async fn submit_attempt(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = MasteryAttempt {
        score: payload.score,
        time_spent: payload.time_spent,
        errors: payload.errors,
        completed_at: payload.completed_at,
    };
    let record = state
        .mastery()
        .record_attempt(&payload.student_id, &payload.skill_id, &attempt)?;

    Ok(ok(SubmitAttemptResponse {
        current_level: record.current_level,
        consecutive_successes: record.consecutive_successes,
        next_review_date: record.next_review_date,
    }))
}

async fn get_record(
    State(state): State<AppState>,
    Path((student_id, skill_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.mastery().get(&student_id, &skill_id)?;
    Ok(ok(record))
}
