#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;

use assessment_engine::assessment::{
    AssessmentConfig, InMemoryItemBank, InMemoryMasteryStore, Question,
};

pub const CORRECT: &str = "a";
pub const WRONG: &str = "b";

pub fn seeded_bank() -> InMemoryItemBank {
    let items = (0..=40)
        .map(|i| Question {
            id: format!("item-{i:02}"),
            difficulty: i as f64 * 0.25,
            topic: Some("number-sense".to_string()),
            prompt: format!("Item {i}"),
            choices: vec![CORRECT.to_string(), WRONG.to_string()],
            correct_answer: CORRECT.to_string(),
        })
        .collect();
    InMemoryItemBank::new(items)
}

pub fn test_config(max_questions: usize) -> AssessmentConfig {
    let mut config = AssessmentConfig::default();
    config.termination.max_questions = max_questions;
    config.termination.selection_band = 10.0;
    config.cache.jitter_ratio = 0.0;
    config
}

pub fn create_test_app(max_questions: usize) -> Router {
    assessment_engine::create_app_with(
        &test_config(max_questions),
        Arc::new(seeded_bank()),
        Arc::new(InMemoryMasteryStore::new()),
    )
    .expect("test app")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
