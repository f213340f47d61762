//! Live sessions: data model, the in-memory store and history persistence.

mod persistence;
mod sqlite;
mod store;
mod types;

pub use persistence::{PersistenceError, SessionPersistence};
pub use sqlite::SqliteSessionPersistence;
pub use store::{LiveSessionStore, SessionError, SessionView};
pub use types::{AIScript, LiveProduct, LiveSession, NarrationItem, SessionSummary};
