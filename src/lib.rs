pub mod assessment;
pub mod cache;
pub mod config;
pub mod logging;
pub mod response;
pub mod routes;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::assessment::{
    AssessmentConfig, EngineResult, InMemoryItemBank, InMemoryMasteryStore, ItemBank,
    MasteryStore,
};
use crate::state::AppState;

/// Builds the HTTP app from environment configuration with in-process stores.
pub fn create_app(config: &config::Config) -> EngineResult<axum::Router> {
    let items = match &config.item_bank_path {
        Some(path) => {
            let bank = InMemoryItemBank::load_json(path)?;
            tracing::info!(path = %path, items = bank.len(), "item bank loaded");
            bank
        }
        None => {
            tracing::warn!("ITEM_BANK_PATH not set, starting with an empty item bank");
            InMemoryItemBank::default()
        }
    };

    create_app_with(
        &AssessmentConfig::from_env(),
        Arc::new(items),
        Arc::new(InMemoryMasteryStore::new()),
    )
}

pub fn create_app_with(
    assessment: &AssessmentConfig,
    items: Arc<dyn ItemBank>,
    store: Arc<dyn MasteryStore>,
) -> EngineResult<axum::Router> {
    let state = AppState::build(assessment, items, store)?;

    Ok(routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
