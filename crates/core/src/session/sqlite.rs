//! SQLite-backed session history.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{LiveSession, PersistenceError, SessionPersistence};

/// SQLite-backed session persistence.
///
/// Sessions are stored one row each; products and scripts are JSON columns.
pub struct SqliteSessionPersistence {
    conn: Mutex<Connection>,
}

impl SqliteSessionPersistence {
    /// Open (or create) the database file and tables.
    pub fn new(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|e| PersistenceError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PersistenceError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PersistenceError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS live_sessions (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                account_ref TEXT NOT NULL,
                scheduled_start_time TEXT,
                created_at TEXT NOT NULL,
                products TEXT NOT NULL,
                scripts TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_live_sessions_position ON live_sessions(position);
            "#,
        )
        .map_err(|e| PersistenceError::Database(e.to_string()))
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<(LiveSession, String, String)> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let account_ref: String = row.get(2)?;
        let scheduled_str: Option<String> = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        let products_json: String = row.get(5)?;
        let scripts_json: String = row.get(6)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let scheduled_start_time = scheduled_str
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let session = LiveSession {
            id,
            title,
            account_ref,
            scheduled_start_time,
            created_at,
            products: Vec::new(),
            scripts: Vec::new(),
        };

        Ok((session, products_json, scripts_json))
    }
}

impl SessionPersistence for SqliteSessionPersistence {
    fn load(&self) -> Result<Vec<LiveSession>, PersistenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, account_ref, scheduled_start_time, created_at, products, scripts
                 FROM live_sessions ORDER BY position ASC",
            )
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_session)
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        let mut sessions = Vec::new();
        for row in rows {
            let (mut session, products_json, scripts_json) =
                row.map_err(|e| PersistenceError::Database(e.to_string()))?;
            session.products = serde_json::from_str(&products_json)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            session.scripts = serde_json::from_str(&scripts_json)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            sessions.push(session);
        }

        Ok(sessions)
    }

    fn save(&self, sessions: &[LiveSession]) -> Result<(), PersistenceError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        tx.execute("DELETE FROM live_sessions", [])
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

        for (position, session) in sessions.iter().enumerate() {
            let products = serde_json::to_string(&session.products)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
            let scripts = serde_json::to_string(&session.scripts)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

            tx.execute(
                "INSERT INTO live_sessions
                 (id, position, title, account_ref, scheduled_start_time, created_at, products, scripts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session.id,
                    position as i64,
                    session.title,
                    session.account_ref,
                    session.scheduled_start_time.map(|t| t.to_rfc3339()),
                    session.created_at.to_rfc3339(),
                    products,
                    scripts,
                ],
            )
            .map_err(|e| PersistenceError::Database(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| PersistenceError::Database(e.to_string()))
    }
}
