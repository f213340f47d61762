//! Active session plus bounded, recency-ordered history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::events::{EventBus, LiveEvent};
use crate::script::render_script;

use super::{
    AIScript, LiveProduct, LiveSession, NarrationItem, PersistenceError, SessionPersistence,
    SessionSummary,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("no active session")]
    NoActiveSession,
}

#[derive(Default)]
struct StoreInner {
    /// Most recent first.
    history: Vec<LiveSession>,
    active_id: Option<String>,
}

impl StoreInner {
    fn active(&self) -> Option<&LiveSession> {
        let id = self.active_id.as_ref()?;
        self.history.iter().find(|s| &s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut LiveSession> {
        self.history.iter_mut().find(|s| s.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.history.iter().position(|s| s.id == id)
    }
}

/// Holder of the live sessions.
///
/// Cheap to clone; all clones share the same state. Writers are ingestion and
/// script generation; the narration controller and sync hub read through
/// [`SessionView`].
#[derive(Clone)]
pub struct LiveSessionStore {
    inner: Arc<RwLock<StoreInner>>,
    max_history: usize,
    events: Arc<dyn EventBus<LiveEvent>>,
    persistence: Option<Arc<dyn SessionPersistence>>,
    fallback_template: Arc<String>,
}

impl LiveSessionStore {
    pub fn new(max_history: usize, events: Arc<dyn EventBus<LiveEvent>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            max_history: max_history.max(1),
            events,
            persistence: None,
            fallback_template: Arc::new(crate::script::DEFAULT_TEMPLATE.to_string()),
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn SessionPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Template used when a script arrives with empty content.
    pub fn with_fallback_template(mut self, template: impl Into<String>) -> Self {
        self.fallback_template = Arc::new(template.into());
        self
    }

    /// Read-only projection for other components.
    pub fn view(&self) -> SessionView {
        SessionView {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Load history from persistence. Failures are logged; returns the number
    /// of sessions restored.
    pub async fn restore(&self) -> usize {
        let Some(persistence) = &self.persistence else {
            return 0;
        };

        match persistence.load() {
            Ok(mut sessions) => {
                sessions.truncate(self.max_history);
                let count = sessions.len();
                let mut inner = self.inner.write().await;
                inner.history = sessions;
                inner.active_id = None;
                info!("Restored {} sessions from history", count);
                count
            }
            Err(e) => {
                warn!("Failed to load session history, starting empty: {}", e);
                0
            }
        }
    }

    /// Add a new session and make it active. Evicts the oldest sessions
    /// beyond the history limit.
    pub async fn create_session(&self, session: LiveSession) -> SessionSummary {
        let session_id = session.id.clone();
        let summary = SessionSummary::from_session(&session, true);
        {
            let mut inner = self.inner.write().await;
            if let Some(pos) = inner.position(&session_id) {
                warn!("Session {} already exists, replacing it", session_id);
                inner.history.remove(pos);
            }
            inner.history.insert(0, session);
            inner.active_id = Some(session_id.clone());

            while inner.history.len() > self.max_history {
                if let Some(evicted) = inner.history.pop() {
                    debug!("Evicted session {} from history", evicted.id);
                }
            }
        }

        info!("Created session {}", session_id);
        self.events
            .publish(LiveEvent::SessionActivated { session_id });
        summary
    }

    /// Make a stored session active and move it to the front of the history.
    pub async fn activate(&self, id: &str) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.write().await;
            let pos = inner
                .position(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            let session = inner.history.remove(pos);
            inner.history.insert(0, session);
            inner.active_id = Some(id.to_string());
        }

        info!("Activated session {}", id);
        self.events.publish(LiveEvent::SessionActivated {
            session_id: id.to_string(),
        });
        Ok(())
    }

    /// Remove a session from history.
    pub async fn delete(&self, id: &str) -> Result<LiveSession, SessionError> {
        let (removed, was_active) = {
            let mut inner = self.inner.write().await;
            let pos = inner
                .position(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            let removed = inner.history.remove(pos);
            let was_active = inner.active_id.as_deref() == Some(id);
            if was_active {
                inner.active_id = None;
            }
            (removed, was_active)
        };

        info!("Deleted session {}", id);
        if was_active {
            self.events.publish(LiveEvent::SessionCleared);
        }
        Ok(removed)
    }

    pub async fn get(&self, id: &str) -> Option<LiveSession> {
        let inner = self.inner.read().await;
        inner.history.iter().find(|s| s.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let inner = self.inner.read().await;
        inner
            .history
            .iter()
            .map(|s| SessionSummary::from_session(s, inner.active_id.as_ref() == Some(&s.id)))
            .collect()
    }

    pub async fn active_session(&self) -> Option<LiveSession> {
        self.inner.read().await.active().cloned()
    }

    pub async fn active_id(&self) -> Option<String> {
        self.inner.read().await.active_id.clone()
    }

    /// Append ingested products to session `id`, active or not. Returns the
    /// new total.
    pub async fn append_products(
        &self,
        id: &str,
        products: Vec<LiveProduct>,
    ) -> Result<usize, SessionError> {
        let added = products.len();
        let (session_id, total) = {
            let mut inner = self.inner.write().await;
            let session = inner
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            session.products.extend(products);
            (session.id.clone(), session.products.len())
        };

        if added > 0 {
            self.events.publish(LiveEvent::ProductsAppended {
                session_id,
                added,
                total,
            });
        }
        Ok(total)
    }

    /// Replace the scripts of session `id`.
    ///
    /// Scripts with blank content are filled from the fallback template so
    /// that every stored script has text.
    pub async fn set_scripts(
        &self,
        id: &str,
        scripts: Vec<AIScript>,
    ) -> Result<usize, SessionError> {
        let (session_id, count) = {
            let mut inner = self.inner.write().await;
            let session = inner
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

            let repaired: Vec<AIScript> = scripts
                .into_iter()
                .map(|mut script| {
                    if script.content.trim().is_empty() {
                        warn!(
                            "Script {} for product {} is empty, using template",
                            script.id, script.related_product_id
                        );
                        let product = session.product(&script.related_product_id);
                        script.content = render_script(&self.fallback_template, product);
                    }
                    script
                })
                .collect();

            session.scripts = repaired;
            (session.id.clone(), session.scripts.len())
        };

        self.events
            .publish(LiveEvent::ScriptsUpdated { session_id, count });
        Ok(count)
    }

    /// Write the whole history to persistence.
    pub async fn checkpoint(&self) -> Result<(), PersistenceError> {
        let Some(persistence) = &self.persistence else {
            debug!("No persistence configured, skipping checkpoint");
            return Ok(());
        };

        let sessions = self.inner.read().await.history.clone();
        persistence.save(&sessions)?;
        debug!("Checkpointed {} sessions", sessions.len());
        Ok(())
    }

    /// Checkpoint, logging instead of failing.
    pub async fn checkpoint_best_effort(&self) {
        if let Err(e) = self.checkpoint().await {
            warn!("Failed to checkpoint sessions, continuing in memory: {}", e);
        }
    }
}

/// Read-only access to the active session.
#[derive(Clone)]
pub struct SessionView {
    inner: Arc<RwLock<StoreInner>>,
}

impl SessionView {
    pub async fn active_id(&self) -> Option<String> {
        self.inner.read().await.active_id.clone()
    }

    pub async fn narration_len(&self) -> usize {
        self.inner
            .read()
            .await
            .active()
            .map(|s| s.narration_len())
            .unwrap_or(0)
    }

    pub async fn narration_item(&self, index: usize) -> Option<NarrationItem> {
        self.inner.read().await.active()?.narration_item(index)
    }

    pub async fn scheduled_start(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.active()?.scheduled_start_time
    }

    pub async fn snapshot(&self) -> Option<LiveSession> {
        self.inner.read().await.active().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastBus;
    use crate::testing::MockPersistence;

    fn bus() -> Arc<BroadcastBus<LiveEvent>> {
        Arc::new(BroadcastBus::default())
    }

    fn product(sku: &str) -> LiveProduct {
        LiveProduct {
            sku: sku.to_string(),
            title: format!("Item {}", sku),
            image_url: format!("https://img.example/{}.jpg", sku),
            price: "10.00".to_string(),
            shop_name: "Shop".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_activates_and_publishes() {
        let bus = bus();
        let mut rx = bus.subscribe();
        let store = LiveSessionStore::new(5, bus.clone());

        let summary = store
            .create_session(LiveSession::new("live-1", "Show", "acct", None))
            .await;

        assert!(summary.active);
        assert_eq!(store.active_id().await.as_deref(), Some("live-1"));
        assert_eq!(
            rx.recv().await.unwrap(),
            LiveEvent::SessionActivated {
                session_id: "live-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_history_evicts_oldest() {
        let store = LiveSessionStore::new(2, bus());
        for id in ["a", "b", "c"] {
            store
                .create_session(LiveSession::new(id, id, "acct", None))
                .await;
        }

        let ids: Vec<String> = store.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["c".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_moves_to_front() {
        let store = LiveSessionStore::new(5, bus());
        store.create_session(LiveSession::new("a", "a", "x", None)).await;
        store.create_session(LiveSession::new("b", "b", "x", None)).await;

        store.activate("a").await.unwrap();
        let list = store.list().await;
        assert_eq!(list[0].id, "a");
        assert!(list[0].active);
        assert!(!list[1].active);

        assert!(matches!(
            store.activate("missing").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_active_clears() {
        let store = LiveSessionStore::new(5, bus());
        store.create_session(LiveSession::new("a", "a", "x", None)).await;

        store.delete("a").await.unwrap();
        assert!(store.active_session().await.is_none());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_append_requires_existing_session() {
        let store = LiveSessionStore::new(5, bus());
        let result = store.append_products("missing", vec![product("1")]).await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_writes_target_named_session_not_active_one() {
        let store = LiveSessionStore::new(5, bus());
        store.create_session(LiveSession::new("a", "a", "x", None)).await;
        store.create_session(LiveSession::new("b", "b", "x", None)).await;
        assert_eq!(store.active_id().await.as_deref(), Some("b"));

        store.append_products("a", vec![product("1")]).await.unwrap();
        store
            .set_scripts(
                "a",
                vec![AIScript {
                    id: "s1".to_string(),
                    content: "Pitch".to_string(),
                    related_product_id: "1".to_string(),
                }],
            )
            .await
            .unwrap();

        let a = store.get("a").await.unwrap();
        assert_eq!(a.products.len(), 1);
        assert_eq!(a.scripts.len(), 1);
        let b = store.get("b").await.unwrap();
        assert!(b.products.is_empty());
        assert!(b.scripts.is_empty());
    }

    #[tokio::test]
    async fn test_append_products_accumulates() {
        let store = LiveSessionStore::new(5, bus());
        store.create_session(LiveSession::new("a", "a", "x", None)).await;

        assert_eq!(store.append_products("a", vec![product("1")]).await.unwrap(), 1);
        assert_eq!(
            store
                .append_products("a", vec![product("2"), product("3")])
                .await
                .unwrap(),
            3
        );
        assert_eq!(store.view().narration_len().await, 3);
    }

    #[tokio::test]
    async fn test_set_scripts_fills_empty_content() {
        let store = LiveSessionStore::new(5, bus()).with_fallback_template("Buy {title} now");
        store.create_session(LiveSession::new("a", "a", "x", None)).await;
        store.append_products("a", vec![product("1")]).await.unwrap();

        store
            .set_scripts(
                "a",
                vec![AIScript {
                    id: "s1".to_string(),
                    content: "   ".to_string(),
                    related_product_id: "1".to_string(),
                }],
            )
            .await
            .unwrap();

        let item = store.view().narration_item(0).await.unwrap();
        assert_eq!(item.script.as_deref(), Some("Buy Item 1 now"));
    }

    #[tokio::test]
    async fn test_blank_template_still_fills_script() {
        let store = LiveSessionStore::new(5, bus()).with_fallback_template("");
        store.create_session(LiveSession::new("a", "a", "x", None)).await;
        store.append_products("a", vec![product("1")]).await.unwrap();

        store
            .set_scripts(
                "a",
                vec![AIScript {
                    id: "s1".to_string(),
                    content: String::new(),
                    related_product_id: "1".to_string(),
                }],
            )
            .await
            .unwrap();

        let session = store.get("a").await.unwrap();
        assert!(!session.scripts[0].content.trim().is_empty());
        assert!(session.scripts[0].content.contains("Item 1"));
    }

    #[tokio::test]
    async fn test_checkpoint_and_restore() {
        let persistence = Arc::new(MockPersistence::new());
        let store = LiveSessionStore::new(5, bus()).with_persistence(persistence.clone());
        store.create_session(LiveSession::new("a", "a", "x", None)).await;
        store.checkpoint().await.unwrap();
        assert_eq!(persistence.save_count(), 1);

        let restored = LiveSessionStore::new(5, bus()).with_persistence(persistence.clone());
        assert_eq!(restored.restore().await, 1);
        assert!(restored.get("a").await.is_some());
        assert!(restored.active_id().await.is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_failure_is_non_fatal() {
        let persistence = Arc::new(MockPersistence::new());
        persistence.set_fail(true);
        let store = LiveSessionStore::new(5, bus()).with_persistence(persistence.clone());
        store.create_session(LiveSession::new("a", "a", "x", None)).await;

        assert!(store.checkpoint().await.is_err());
        store.checkpoint_best_effort().await;
        assert_eq!(store.restore().await, 0);
        // Still usable in memory
        assert!(store.get("a").await.is_some());
    }
}
