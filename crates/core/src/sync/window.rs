//! Display surface windows.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::WindowConfig;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Failed to launch window for {surface_id}: {message}")]
    Launch { surface_id: String, message: String },

    #[error("Surface window already open: {0}")]
    AlreadyOpen(String),

    #[error("Surface window not open: {0}")]
    NotOpen(String),
}

/// Parameters for opening a surface window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceParams {
    /// Page the window loads.
    pub url: String,
}

/// An opened surface window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowHandle {
    pub surface_id: String,
    /// Launcher process id, when a process was started.
    pub pid: Option<u32>,
}

/// Opens and closes the windows display surfaces live in.
#[async_trait]
pub trait WindowManager: Send + Sync {
    fn name(&self) -> &str;

    async fn open(&self, surface_id: &str, params: &SurfaceParams)
        -> Result<WindowHandle, WindowError>;

    async fn close(&self, surface_id: &str) -> Result<(), WindowError>;

    /// Ids of windows that went away without being asked to (user closed
    /// them, process exited).
    fn subscribe_closed(&self) -> broadcast::Receiver<String>;
}

/// Launches a configured command per surface, e.g. a browser in app mode.
///
/// `{url}` and `{surface_id}` in the arguments are substituted. Closing a
/// surface kills its process; a process exiting on its own is reported
/// through [`WindowManager::subscribe_closed`].
pub struct CommandWindowManager {
    config: WindowConfig,
    running: Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>,
    closed_tx: broadcast::Sender<String>,
}

impl CommandWindowManager {
    pub fn new(config: WindowConfig) -> Self {
        let (closed_tx, _) = broadcast::channel(16);
        Self {
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
            closed_tx,
        }
    }

    fn build_args(&self, surface_id: &str, params: &SurfaceParams) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{url}", &params.url)
                    .replace("{surface_id}", surface_id)
            })
            .collect()
    }
}

#[async_trait]
impl WindowManager for CommandWindowManager {
    fn name(&self) -> &str {
        "command"
    }

    async fn open(
        &self,
        surface_id: &str,
        params: &SurfaceParams,
    ) -> Result<WindowHandle, WindowError> {
        let mut running = self.running.lock().await;
        if running.contains_key(surface_id) {
            return Err(WindowError::AlreadyOpen(surface_id.to_string()));
        }

        let args = self.build_args(surface_id, params);
        debug!("Launching {} {:?}", self.config.command, args);

        let mut child = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WindowError::Launch {
                surface_id: surface_id.to_string(),
                message: e.to_string(),
            })?;
        let pid = child.id();

        let (kill_tx, kill_rx) = oneshot::channel();
        running.insert(surface_id.to_string(), kill_tx);

        let id = surface_id.to_string();
        let registry = Arc::clone(&self.running);
        let closed_tx = self.closed_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    info!("Surface window {} exited ({:?})", id, status.ok());
                    registry.lock().await.remove(&id);
                    let _ = closed_tx.send(id);
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill surface window {}: {}", id, e);
                    }
                }
            }
        });

        info!("Opened surface window {} (pid {:?})", surface_id, pid);
        Ok(WindowHandle {
            surface_id: surface_id.to_string(),
            pid,
        })
    }

    async fn close(&self, surface_id: &str) -> Result<(), WindowError> {
        let kill_tx = self
            .running
            .lock()
            .await
            .remove(surface_id)
            .ok_or_else(|| WindowError::NotOpen(surface_id.to_string()))?;
        let _ = kill_tx.send(());
        info!("Closed surface window {}", surface_id);
        Ok(())
    }

    fn subscribe_closed(&self) -> broadcast::Receiver<String> {
        self.closed_tx.subscribe()
    }
}

/// Used when no launcher is configured: surfaces are opened externally
/// (for instance as a capture tool browser source) and connect by URL.
pub struct NullWindowManager {
    closed_tx: broadcast::Sender<String>,
}

impl Default for NullWindowManager {
    fn default() -> Self {
        let (closed_tx, _) = broadcast::channel(1);
        Self { closed_tx }
    }
}

impl NullWindowManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowManager for NullWindowManager {
    fn name(&self) -> &str {
        "external"
    }

    async fn open(
        &self,
        surface_id: &str,
        params: &SurfaceParams,
    ) -> Result<WindowHandle, WindowError> {
        info!(
            "No window launcher configured; open {} to show surface {}",
            params.url, surface_id
        );
        Ok(WindowHandle {
            surface_id: surface_id.to_string(),
            pid: None,
        })
    }

    async fn close(&self, surface_id: &str) -> Result<(), WindowError> {
        debug!("Surface {} is managed externally, nothing to close", surface_id);
        Ok(())
    }

    fn subscribe_closed(&self) -> broadcast::Receiver<String> {
        self.closed_tx.subscribe()
    }
}
