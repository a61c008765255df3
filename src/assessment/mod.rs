//! Adaptive placement and mastery progression engine.
//!
//! - [`estimator`] damped step estimator for one placement session
//! - [`placement`] session lifecycle, item sequencing, termination, level mapping
//! - [`mastery`] per-skill streak state machine with optimistic writes
//! - [`scheduler`] spaced review dates from mastery strength

pub mod config;
pub mod error;
pub mod estimator;
pub mod item_bank;
pub mod mastery;
pub mod placement;
pub mod scheduler;
pub mod store;
pub mod types;

pub use config::AssessmentConfig;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use estimator::{AbilityEstimator, AbilityState};
pub use item_bank::{InMemoryItemBank, ItemBank};
pub use mastery::{MasteryService, MasteryTracker};
pub use placement::PlacementEngine;
pub use scheduler::ReviewScheduler;
pub use store::{InMemoryMasteryStore, MasteryStore, SessionStore};
pub use types::*;
