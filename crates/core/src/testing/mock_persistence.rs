//! In-memory session persistence for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::session::{LiveSession, PersistenceError, SessionPersistence};

/// Keeps the last saved sessions in memory. Can be told to fail.
#[derive(Debug, Default)]
pub struct MockPersistence {
    sessions: Mutex<Vec<LiveSession>>,
    saves: AtomicUsize,
    fail: AtomicBool,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every load and save fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Database("mock failure".to_string()));
        }
        Ok(())
    }
}

impl SessionPersistence for MockPersistence {
    fn load(&self) -> Result<Vec<LiveSession>, PersistenceError> {
        self.check()?;
        self.sessions
            .lock()
            .map(|s| s.clone())
            .map_err(|e| PersistenceError::Database(e.to_string()))
    }

    fn save(&self, sessions: &[LiveSession]) -> Result<(), PersistenceError> {
        self.check()?;
        let mut stored = self
            .sessions
            .lock()
            .map_err(|e| PersistenceError::Database(e.to_string()))?;
        *stored = sessions.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
