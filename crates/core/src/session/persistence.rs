//! Session history persistence.

use thiserror::Error;

use super::LiveSession;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Stores the session history.
///
/// Best-effort from the orchestrator's point of view: failures are logged and
/// the session keeps operating in memory.
pub trait SessionPersistence: Send + Sync {
    /// Load all stored sessions, most recent first.
    fn load(&self) -> Result<Vec<LiveSession>, PersistenceError>;

    /// Replace the stored history with `sessions`.
    fn save(&self, sessions: &[LiveSession]) -> Result<(), PersistenceError>;
}
