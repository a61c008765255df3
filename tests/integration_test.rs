use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{get, post_json, read_json, CORRECT, WRONG};

#[tokio::test]
async fn test_health_root() {
    let app = common::create_test_app(5);
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_404_not_found() {
    let app = common::create_test_app(5);
    let response = app.oneshot(get("/nonexistent/path")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_placement_runs_to_completion() {
    let app = common::create_test_app(4);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/placement/sessions",
            json!({ "studentId": "stu-1", "initialParams": { "initialDifficulty": 5.0 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();
    let mut question_id = body["data"]["firstQuestion"]["id"].as_str().unwrap().to_string();
    assert!(body["data"]["firstQuestion"].get("correctAnswer").is_none());

    let mut last = serde_json::Value::Null;
    for i in 0..4 {
        let answer = if i == 1 { WRONG } else { CORRECT };
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/placement/sessions/{session_id}/answers"),
                json!({ "questionId": question_id, "answer": answer, "timeSpent": 15.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        last = read_json(response).await["data"].clone();
        if i < 3 {
            assert_eq!(last["kind"], "next");
            question_id = last["nextQuestion"]["id"].as_str().unwrap().to_string();
        }
    }
    assert_eq!(last["kind"], "completed");
    assert_eq!(last["totalTime"], 60.0);
    assert!(last["finalLevel"]["gradeBand"].is_string());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/placement/sessions/{session_id}")))
        .await
        .unwrap();
    let result = read_json(response).await["data"].clone();
    assert_eq!(result["status"], "COMPLETED");
    assert_eq!(result["finalLevel"], last["finalLevel"]);
    assert_eq!(result["questionsAnswered"], 4);

    let response = app
        .oneshot(get(&format!("/api/placement/sessions/{session_id}/next")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "SESSION_COMPLETED");
}

#[tokio::test]
async fn test_duplicate_answer_is_rejected() {
    let app = common::create_test_app(10);
    let body = read_json(
        app.clone()
            .oneshot(post_json("/api/placement/sessions", json!({ "studentId": "stu-2" })))
            .await
            .unwrap(),
    )
    .await;
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();
    let question_id = body["data"]["firstQuestion"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/placement/sessions/{session_id}/answers");
    let payload = json!({ "questionId": question_id, "answer": CORRECT, "timeSpent": 8.0 });

    let first = app.clone().oneshot(post_json(&uri, payload.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(post_json(&uri, payload)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(second).await["code"], "UNKNOWN_QUESTION");

    let result = read_json(
        app.oneshot(get(&format!("/api/placement/sessions/{session_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(result["data"]["status"], "IN_PROGRESS");
    assert_eq!(result["data"]["questionsAnswered"], 1);
    assert!(result["data"].get("finalLevel").is_none());
}

#[tokio::test]
async fn test_start_rejects_out_of_range_difficulty() {
    let app = common::create_test_app(5);
    let response = app
        .oneshot(post_json(
            "/api/placement/sessions",
            json!({ "studentId": "stu-3", "initialParams": { "initialDifficulty": 42.0 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = common::create_test_app(5);
    let response = app
        .oneshot(get("/api/placement/sessions/does-not-exist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_finish_session_early() {
    let app = common::create_test_app(10);
    let body = read_json(
        app.clone()
            .oneshot(post_json("/api/placement/sessions", json!({ "studentId": "stu-4" })))
            .await
            .unwrap(),
    )
    .await;
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/placement/sessions/{session_id}/finish"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = read_json(response).await["data"].clone();
    assert_eq!(result["status"], "COMPLETED");
    assert_eq!(result["finalLevel"]["position"], "AT");
    assert_eq!(result["finalLevel"]["gradeBand"], "3-5");
    assert_eq!(result["totalTime"], 0.0);
}

#[tokio::test]
async fn test_mastery_attempts_advance_level() {
    let app = common::create_test_app(5);
    let completed_at: DateTime<Utc> = "2024-05-03T12:00:00Z".parse().unwrap();

    let mut last = serde_json::Value::Null;
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/mastery/attempts",
                json!({
                    "studentId": "stu-5",
                    "skillId": "fractions",
                    "score": 92.0,
                    "timeSpent": 120.0,
                    "errors": [],
                    "completedAt": completed_at.to_rfc3339(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        last = read_json(response).await["data"].clone();
    }
    assert_eq!(last["currentLevel"], "PRACTICING");
    assert_eq!(last["consecutiveSuccesses"], 0);
    let next_review: DateTime<Utc> = last["nextReviewDate"].as_str().unwrap().parse().unwrap();
    assert_eq!(next_review, completed_at + Duration::days(1));

    let response = app
        .clone()
        .oneshot(get("/api/mastery/stu-5/fractions"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = read_json(response).await["data"].clone();
    assert_eq!(record["currentLevel"], "PRACTICING");
    assert_eq!(record["version"], 3);

    let response = app.oneshot(get("/api/mastery/stu-5/geometry")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mastery_rejects_out_of_range_score() {
    let app = common::create_test_app(5);
    let response = app
        .oneshot(post_json(
            "/api/mastery/attempts",
            json!({
                "studentId": "stu-6",
                "skillId": "fractions",
                "score": 120.0,
                "timeSpent": 10.0,
                "completedAt": "2024-05-03T12:00:00Z",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
