//! Mock window manager for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::sync::{SurfaceParams, WindowError, WindowHandle, WindowManager};

/// Records opened and closed surface windows without launching anything.
#[derive(Debug)]
pub struct MockWindowManager {
    open: Arc<RwLock<HashSet<String>>>,
    opened: Arc<RwLock<Vec<(String, String)>>>,
    closed: Arc<RwLock<Vec<String>>>,
    closed_tx: broadcast::Sender<String>,
}

impl Default for MockWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWindowManager {
    pub fn new() -> Self {
        let (closed_tx, _) = broadcast::channel(16);
        Self {
            open: Arc::new(RwLock::new(HashSet::new())),
            opened: Arc::new(RwLock::new(Vec::new())),
            closed: Arc::new(RwLock::new(Vec::new())),
            closed_tx,
        }
    }

    /// `(surface_id, url)` per open call.
    pub async fn opened(&self) -> Vec<(String, String)> {
        self.opened.read().await.clone()
    }

    /// Surface ids closed through [`WindowManager::close`].
    pub async fn closed(&self) -> Vec<String> {
        self.closed.read().await.clone()
    }

    /// Pretend the user closed the window.
    pub fn simulate_closed(&self, surface_id: &str) {
        let _ = self.closed_tx.send(surface_id.to_string());
    }
}

#[async_trait]
impl WindowManager for MockWindowManager {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(
        &self,
        surface_id: &str,
        params: &SurfaceParams,
    ) -> Result<WindowHandle, WindowError> {
        if !self.open.write().await.insert(surface_id.to_string()) {
            return Err(WindowError::AlreadyOpen(surface_id.to_string()));
        }
        self.opened
            .write()
            .await
            .push((surface_id.to_string(), params.url.clone()));
        Ok(WindowHandle {
            surface_id: surface_id.to_string(),
            pid: None,
        })
    }

    async fn close(&self, surface_id: &str) -> Result<(), WindowError> {
        if !self.open.write().await.remove(surface_id) {
            return Err(WindowError::NotOpen(surface_id.to_string()));
        }
        self.closed.write().await.push(surface_id.to_string());
        Ok(())
    }

    fn subscribe_closed(&self) -> broadcast::Receiver<String> {
        self.closed_tx.subscribe()
    }
}
