use std::collections::HashSet;
use std::path::Path;

use parking_lot::RwLock;

use super::error::{EngineError, EngineResult};
use super::types::Question;

/// Read-only question source consulted by placement sessions.
pub trait ItemBank: Send + Sync {
    /// Unseen item closest to `target`, at most `band` away. Ties prefer the
    /// easier item, then the lexicographically smaller id.
    fn nearest_unseen(
        &self,
        student_id: &str,
        target: f64,
        band: f64,
        seen: &HashSet<String>,
    ) -> Option<Question>;
}

#[derive(Default)]
pub struct InMemoryItemBank {
    items: RwLock<Vec<Question>>,
}

impl InMemoryItemBank {
    pub fn new(items: Vec<Question>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Storage(format!("read {}: {e}", path.display())))?;
        let items: Vec<Question> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Storage(format!("parse {}: {e}", path.display())))?;
        if let Some(bad) = items.iter().find(|q| !q.difficulty.is_finite()) {
            return Err(EngineError::invalid(format!("question {} has no usable difficulty", bad.id)));
        }
        Ok(Self::new(items))
    }

    pub fn add(&self, question: Question) {
        self.items.write().push(question);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ItemBank for InMemoryItemBank {
    fn nearest_unseen(
        &self,
        _student_id: &str,
        target: f64,
        band: f64,
        seen: &HashSet<String>,
    ) -> Option<Question> {
        self.items
            .read()
            .iter()
            .filter(|q| !seen.contains(&q.id))
            .filter(|q| (q.difficulty - target).abs() <= band)
            .min_by(|a, b| {
                let da = (a.difficulty - target).abs();
                let db = (b.difficulty - target).abs();
                da.total_cmp(&db)
                    .then(a.difficulty.total_cmp(&b.difficulty))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned()
    }
}
