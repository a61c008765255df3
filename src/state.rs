use std::sync::Arc;
use std::time::Instant;

use crate::assessment::{
    AssessmentConfig, EngineResult, ItemBank, MasteryService, MasteryStore, MasteryTracker,
    PlacementEngine,
};
use crate::cache::TtlCache;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    placement: Arc<PlacementEngine>,
    mastery: Arc<MasteryService>,
}

impl AppState {
    pub fn new(placement: Arc<PlacementEngine>, mastery: Arc<MasteryService>) -> Self {
        Self {
            started_at: Instant::now(),
            placement,
            mastery,
        }
    }

    /// Wires both engines from one config. Each engine gets its own cache
    /// instance sized from `config.cache`.
    pub fn build(
        config: &AssessmentConfig,
        items: Arc<dyn ItemBank>,
        store: Arc<dyn MasteryStore>,
    ) -> EngineResult<Self> {
        let placement = PlacementEngine::new(config, items, TtlCache::from_config(&config.cache))?;
        let tracker = MasteryTracker::new(config.mastery.clone(), config.review.clone());
        let mastery = MasteryService::new(tracker, store, TtlCache::from_config(&config.cache));
        Ok(Self::new(Arc::new(placement), Arc::new(mastery)))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn placement(&self) -> Arc<PlacementEngine> {
        Arc::clone(&self.placement)
    }

    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }
}
