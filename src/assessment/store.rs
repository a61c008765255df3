//! Storage seams for the engine.
//!
//! Persistence is owned by the caller; these in-memory stores implement the
//! same contracts a database-backed store must honour: sessions are mutated
//! under a per-session lock, mastery records are written with
//! compare-and-swap on `version`, and answered items are remembered per
//! student across sessions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::error::{EngineError, EngineResult};
use super::types::{MasteryRecord, PlacementSession};

pub trait MasteryStore: Send + Sync {
    fn load(&self, student_id: &str, skill_id: &str) -> EngineResult<Option<MasteryRecord>>;

    /// Writes `record` only if the stored version still equals
    /// `expected_version` (`None` meaning "must not exist yet"). Returns the
    /// record as stored, with its bumped version.
    fn compare_and_swap(
        &self,
        record: &MasteryRecord,
        expected_version: Option<u64>,
    ) -> EngineResult<MasteryRecord>;
}

#[derive(Default)]
pub struct InMemoryMasteryStore {
    records: RwLock<HashMap<(String, String), MasteryRecord>>,
}

impl InMemoryMasteryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MasteryStore for InMemoryMasteryStore {
    fn load(&self, student_id: &str, skill_id: &str) -> EngineResult<Option<MasteryRecord>> {
        let key = (student_id.to_string(), skill_id.to_string());
        Ok(self.records.read().get(&key).cloned())
    }

    fn compare_and_swap(
        &self,
        record: &MasteryRecord,
        expected_version: Option<u64>,
    ) -> EngineResult<MasteryRecord> {
        let key = (record.student_id.clone(), record.skill_id.clone());
        let mut records = self.records.write();
        let current_version = records.get(&key).map(|r| r.version);

        if current_version != expected_version {
            return Err(EngineError::Conflict(format!(
                "mastery record {}/{} changed (expected {:?}, found {:?})",
                record.student_id, record.skill_id, expected_version, current_version
            )));
        }

        let mut stored = record.clone();
        stored.version = expected_version.map_or(1, |v| v + 1);
        records.insert(key, stored.clone());
        Ok(stored)
    }
}

/// Sessions keyed by id, each behind its own lock so one test-taker's
/// submissions are serialized without blocking other sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<PlacementSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: PlacementSession) -> EngineResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.id) {
            return Err(EngineError::Conflict(format!("session {} already exists", session.id)));
        }
        sessions.insert(session.id.clone(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    pub fn snapshot(&self, session_id: &str) -> EngineResult<PlacementSession> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().clone();
        Ok(session)
    }

    /// Runs `f` on a copy of the session and commits the copy only if `f`
    /// succeeds, so a failed operation leaves no trace.
    pub fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut PlacementSession) -> EngineResult<R>,
    ) -> EngineResult<R> {
        let handle = self.handle(session_id)?;
        let mut guard = handle.lock();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, session_id: &str) -> EngineResult<Arc<Mutex<PlacementSession>>> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }
}

/// Question ids each student has answered, across every session they took.
#[derive(Default)]
pub struct ExposureLog {
    seen: RwLock<HashMap<String, HashSet<String>>>,
}

impl ExposureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, student_id: &str, question_id: &str) {
        self.seen
            .write()
            .entry(student_id.to_string())
            .or_default()
            .insert(question_id.to_string());
    }

    pub fn seen_by(&self, student_id: &str) -> HashSet<String> {
        self.seen.read().get(student_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::types::SessionStatus;
    use chrono::Utc;

    fn session(id: &str) -> PlacementSession {
        PlacementSession {
            id: id.to_string(),
            student_id: "stu".into(),
            status: SessionStatus::InProgress,
            current_difficulty: 5.0,
            step_size: 2.0,
            history: Vec::new(),
            final_level: None,
            started_at: Utc::now(),
            completed_at: None,
            pending: None,
        }
    }

    #[test]
    fn test_cas_rejects_stale_version() {
        let store = InMemoryMasteryStore::new();
        let record = MasteryRecord::new("stu", "fractions");
        let stored = store.compare_and_swap(&record, None).unwrap();
        assert_eq!(stored.version, 1);

        // second creator loses
        assert!(matches!(
            store.compare_and_swap(&record, None),
            Err(EngineError::Conflict(_))
        ));

        let mut next = stored.clone();
        next.consecutive_successes = 1;
        let stored = store.compare_and_swap(&next, Some(1)).unwrap();
        assert_eq!(stored.version, 2);
        assert!(store.compare_and_swap(&next, Some(1)).is_err());
        assert_eq!(store.load("stu", "fractions").unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_failed_update_leaves_session_untouched() {
        let store = SessionStore::new();
        store.insert(session("s1")).unwrap();

        let result: EngineResult<()> = store.update("s1", |s| {
            s.current_difficulty = 9.0;
            Err(EngineError::invalid("nope"))
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot("s1").unwrap().current_difficulty, 5.0);

        store
            .update("s1", |s| {
                s.current_difficulty = 7.0;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.snapshot("s1").unwrap().current_difficulty, 7.0);
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::new();
        assert!(matches!(
            store.snapshot("missing"),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_exposure_log_is_per_student() {
        let log = ExposureLog::new();
        log.record("ana", "q1");
        log.record("ana", "q2");
        log.record("ana", "q1");
        log.record("ben", "q3");

        let ana = log.seen_by("ana");
        assert_eq!(ana.len(), 2);
        assert!(ana.contains("q1") && ana.contains("q2"));
        assert!(!log.seen_by("ben").contains("q1"));
        assert!(log.seen_by("cara").is_empty());
    }
}
