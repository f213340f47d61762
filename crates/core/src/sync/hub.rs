//! Keeps display surfaces in step with the session and narration state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{EventBus, LiveEvent, NoticeLevel};
use crate::explain::{ExplainCycleController, SwitchOutcome};
use crate::metrics::SYNC_PUSHES;
use crate::session::SessionView;

use super::{SurfaceParams, SurfaceSignal, SurfaceState, SyncConfig, SyncMessage, WindowError, WindowManager};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Unknown surface: {0}")]
    UnknownSurface(String),

    #[error("Sync hub is not running")]
    NotRunning,
}

/// Listing entry for a display surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceInfo {
    pub surface_id: String,
    /// A transport is attached.
    pub connected: bool,
    /// Completed the `ready` handshake on the current connection.
    pub ready: bool,
    /// Still wants updates (not closed).
    pub active: bool,
    /// Opened through the window manager.
    pub window_open: bool,
}

/// Inbound half handed to a surface transport.
#[derive(Clone)]
pub struct SurfaceSender {
    surface_id: String,
    connection: u64,
    tx: mpsc::Sender<Inbound>,
}

impl SurfaceSender {
    pub fn surface_id(&self) -> &str {
        &self.surface_id
    }

    /// Forward a signal to the hub. Returns false if the hub has stopped.
    pub async fn send(&self, signal: SurfaceSignal) -> bool {
        self.tx
            .send(Inbound::Signal {
                surface_id: self.surface_id.clone(),
                connection: self.connection,
                signal,
            })
            .await
            .is_ok()
    }
}

/// Both halves of one surface attachment.
pub struct SurfaceConnection {
    pub surface_id: String,
    /// Messages for the surface, snapshot first after `ready`.
    pub outbound: mpsc::Receiver<SyncMessage>,
    /// Signals from the surface.
    pub inbound: SurfaceSender,
}

enum Inbound {
    Signal {
        surface_id: String,
        connection: u64,
        signal: SurfaceSignal,
    },
}

struct SurfaceEntry {
    tx: Option<mpsc::Sender<SyncMessage>>,
    connection: u64,
    ready: bool,
    active: bool,
    window_open: bool,
}

impl SurfaceEntry {
    fn info(&self, surface_id: &str) -> SurfaceInfo {
        SurfaceInfo {
            surface_id: surface_id.to_string(),
            connected: self.tx.is_some(),
            ready: self.ready,
            active: self.active,
            window_open: self.window_open,
        }
    }

    fn receives_deltas(&self) -> bool {
        self.tx.is_some() && self.ready && self.active
    }
}

/// Mirrors current image, script and countdown to display surfaces.
///
/// A surface gets nothing until it sends `ready`; it then receives a full
/// snapshot followed by deltas. Signals and bus events are handled on one
/// task, so a snapshot always precedes the deltas that follow it. Pushes
/// are fire-and-forget: a full surface queue drops the message, and a bus
/// lag resends full snapshots.
#[derive(Clone)]
pub struct ScreenSyncHub {
    view: SessionView,
    controller: ExplainCycleController,
    windows: Arc<dyn WindowManager>,
    events: Arc<dyn EventBus<LiveEvent>>,
    config: SyncConfig,
    surfaces: Arc<RwLock<HashMap<String, SurfaceEntry>>>,
    /// Projection last pushed as deltas, to diff against.
    last: Arc<RwLock<Option<SurfaceState>>>,
    inbound_tx: mpsc::Sender<Inbound>,
    /// Held here while the loop is stopped; the loop hands it back on exit.
    inbound_rx: Arc<Mutex<Option<mpsc::Receiver<Inbound>>>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    next_connection: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ScreenSyncHub {
    pub fn new(
        view: SessionView,
        controller: ExplainCycleController,
        windows: Arc<dyn WindowManager>,
        events: Arc<dyn EventBus<LiveEvent>>,
        config: SyncConfig,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            view,
            controller,
            windows,
            events,
            config,
            surfaces: Arc::new(RwLock::new(HashMap::new())),
            last: Arc::new(RwLock::new(None)),
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(Some(inbound_rx))),
            task: Arc::new(Mutex::new(None)),
            next_connection: Arc::new(AtomicU64::new(1)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the hub loop (spawns a background task).
    pub async fn start(&self) -> Result<(), SyncError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Sync hub already running");
            return Ok(());
        }
        let Some(inbound_rx) = self.inbound_rx.lock().await.take() else {
            self.running.store(false, Ordering::SeqCst);
            return Err(SyncError::NotRunning);
        };

        let hub = self.clone();
        let events_rx = self.events.subscribe();
        let closed_rx = self.windows.subscribe_closed();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            hub.run(events_rx, inbound_rx, closed_rx, shutdown_rx).await;
        });
        *self.task.lock().await = Some(handle);

        info!("Sync hub started (window manager: {})", self.windows.name());
        Ok(())
    }

    /// Stop the hub loop and wait for it to exit. Attached surfaces stop
    /// receiving updates until the hub is started again.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Sync hub loop ended abnormally: {}", e);
            }
        }
        info!("Sync hub stopped");
    }

    /// Attach a surface transport. Replaces any previous connection for the
    /// same surface id; the surface must send `ready` to receive state.
    pub async fn attach(&self, surface_id: &str) -> SurfaceConnection {
        let (tx, outbound) = mpsc::channel(self.config.channel_capacity.max(1));
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);

        let mut surfaces = self.surfaces.write().await;
        let entry = surfaces
            .entry(surface_id.to_string())
            .or_insert_with(|| SurfaceEntry {
                tx: None,
                connection,
                ready: false,
                active: true,
                window_open: false,
            });
        entry.tx = Some(tx);
        entry.connection = connection;
        entry.ready = false;
        entry.active = true;
        debug!("Surface {} attached (connection {})", surface_id, connection);

        SurfaceConnection {
            surface_id: surface_id.to_string(),
            outbound,
            inbound: SurfaceSender {
                surface_id: surface_id.to_string(),
                connection,
                tx: self.inbound_tx.clone(),
            },
        }
    }

    /// Transport for `connection` went away.
    pub async fn detach(&self, surface_id: &str, connection: &SurfaceSender) {
        let mut surfaces = self.surfaces.write().await;
        if let Some(entry) = surfaces.get_mut(surface_id) {
            if entry.connection == connection.connection {
                entry.tx = None;
                entry.ready = false;
                debug!("Surface {} detached", surface_id);
            }
        }
    }

    /// Ask the window manager for a surface window.
    pub async fn open_surface(&self, surface_id: &str) -> Result<SurfaceInfo, SyncError> {
        let params = SurfaceParams {
            url: self.config.surface_url_for(surface_id),
        };
        self.windows.open(surface_id, &params).await?;

        let mut surfaces = self.surfaces.write().await;
        let entry = surfaces
            .entry(surface_id.to_string())
            .or_insert_with(|| SurfaceEntry {
                tx: None,
                connection: 0,
                ready: false,
                active: true,
                window_open: false,
            });
        entry.window_open = true;
        entry.active = true;
        Ok(entry.info(surface_id))
    }

    /// Close a surface window and stop pushing to it.
    pub async fn close_surface(&self, surface_id: &str) -> Result<(), SyncError> {
        let window_open = {
            let surfaces = self.surfaces.read().await;
            let entry = surfaces
                .get(surface_id)
                .ok_or_else(|| SyncError::UnknownSurface(surface_id.to_string()))?;
            entry.window_open
        };
        if window_open {
            self.windows.close(surface_id).await?;
        }
        self.mark_closed(surface_id).await;
        Ok(())
    }

    pub async fn surfaces(&self) -> Vec<SurfaceInfo> {
        let surfaces = self.surfaces.read().await;
        let mut list: Vec<SurfaceInfo> = surfaces.iter().map(|(id, e)| e.info(id)).collect();
        list.sort_by(|a, b| a.surface_id.cmp(&b.surface_id));
        list
    }

    /// Current projection of session and narration state.
    pub async fn current_state(&self) -> SurfaceState {
        let snapshot = self.controller.snapshot().await;
        let item = self.view.narration_item(snapshot.index).await;
        SurfaceState {
            session_id: self.view.active_id().await,
            script_index: snapshot.index,
            product_id: item.as_ref().map(|i| i.product_id.clone()),
            title: item.as_ref().map(|i| i.title.clone()),
            image_url: item.as_ref().and_then(|i| i.image_url.clone()),
            script: item.and_then(|i| i.script),
            countdown: snapshot.countdown,
            phase: snapshot.phase,
        }
    }

    // ------------------------------------------------------------------
    // Hub loop
    // ------------------------------------------------------------------

    async fn run(
        self,
        mut events_rx: broadcast::Receiver<LiveEvent>,
        mut inbound_rx: mpsc::Receiver<Inbound>,
        mut closed_rx: broadcast::Receiver<String>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        *self.last.write().await = Some(self.current_state().await);
        let mut watch_windows = true;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                event = events_rx.recv() => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Sync hub missed {} events, resending snapshots", missed);
                        self.broadcast_snapshot().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(inbound) = inbound_rx.recv() => self.on_inbound(inbound).await,
                closed = closed_rx.recv(), if watch_windows => match closed {
                    Ok(surface_id) => {
                        info!("Surface window {} closed", surface_id);
                        self.mark_closed(&surface_id).await;
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => watch_windows = false,
                },
            }
        }
        *self.inbound_rx.lock().await = Some(inbound_rx);
        debug!("Sync hub loop exited");
    }

    async fn on_inbound(&self, inbound: Inbound) {
        let Inbound::Signal {
            surface_id,
            connection,
            signal,
        } = inbound;

        {
            let surfaces = self.surfaces.read().await;
            match surfaces.get(&surface_id) {
                Some(entry) if entry.connection == connection => {}
                _ => {
                    debug!("Ignoring {:?} from stale connection of {}", signal, surface_id);
                    return;
                }
            }
        }

        match signal {
            SurfaceSignal::Ready => {
                let state = self.current_state().await;
                let mut surfaces = self.surfaces.write().await;
                if let Some(entry) = surfaces.get_mut(&surface_id) {
                    entry.ready = true;
                    entry.active = true;
                    if let Some(tx) = &entry.tx {
                        push(&surface_id, tx, SyncMessage::Snapshot { state });
                    }
                    debug!("Surface {} ready, snapshot sent", surface_id);
                }
            }
            SurfaceSignal::Next => {
                let outcome = self.controller.switch_next().await;
                self.report_intent(&surface_id, "next", outcome);
            }
            SurfaceSignal::Prev => {
                let outcome = self.controller.switch_prev().await;
                self.report_intent(&surface_id, "prev", outcome);
            }
            SurfaceSignal::Closed => self.mark_closed(&surface_id).await,
        }
    }

    fn report_intent(&self, surface_id: &str, intent: &str, outcome: SwitchOutcome) {
        debug!("{} from surface {}: {:?}", intent, surface_id, outcome);
        if let SwitchOutcome::Rejected { remaining_secs } = outcome {
            self.events.publish(LiveEvent::Notice {
                level: NoticeLevel::Warning,
                message: format!(
                    "Next requested from surface {} too early, {}s of narration left",
                    surface_id, remaining_secs
                ),
            });
        }
    }

    async fn on_event(&self, event: LiveEvent) {
        match event {
            LiveEvent::CountdownChanged { countdown } => {
                self.update_last(|s| s.countdown = countdown.clone()).await;
                self.push_deltas(vec![SyncMessage::CountdownChanged { countdown }])
                    .await;
            }
            LiveEvent::PhaseChanged { phase, .. } => {
                self.update_last(|s| s.phase = phase.clone()).await;
                self.push_deltas(vec![SyncMessage::PhaseChanged { phase }])
                    .await;
            }
            LiveEvent::SessionActivated { .. } | LiveEvent::SessionCleared => {
                self.broadcast_snapshot().await;
            }
            LiveEvent::ScriptIndexChanged { .. }
            | LiveEvent::ProductsAppended { .. }
            | LiveEvent::ScriptsUpdated { .. } => {
                let deltas = self.content_deltas().await;
                if !deltas.is_empty() {
                    self.push_deltas(deltas).await;
                }
            }
            LiveEvent::Notice { .. } => {}
        }
    }

    /// Image and script changes since the last push.
    async fn content_deltas(&self) -> Vec<SyncMessage> {
        let current = self.current_state().await;
        let mut last = self.last.write().await;
        let mut deltas = Vec::new();

        let (image_changed, script_changed) = match last.as_ref() {
            Some(prev) => (
                prev.image_url != current.image_url,
                prev.script_index != current.script_index
                    || prev.product_id != current.product_id
                    || prev.script != current.script,
            ),
            None => (true, true),
        };

        if image_changed {
            deltas.push(SyncMessage::ImageChanged {
                image_url: current.image_url.clone(),
            });
        }
        if script_changed {
            deltas.push(SyncMessage::ScriptChanged {
                index: current.script_index,
                product_id: current.product_id.clone(),
                title: current.title.clone(),
                script: current.script.clone(),
            });
        }
        *last = Some(current);
        deltas
    }

    async fn update_last(&self, apply: impl FnOnce(&mut SurfaceState)) {
        if let Some(state) = self.last.write().await.as_mut() {
            apply(state);
        }
    }

    async fn push_deltas(&self, messages: Vec<SyncMessage>) {
        let mut dead = Vec::new();
        {
            let surfaces = self.surfaces.read().await;
            for (surface_id, entry) in surfaces.iter().filter(|(_, e)| e.receives_deltas()) {
                if let Some(tx) = &entry.tx {
                    for message in &messages {
                        if !push(surface_id, tx, message.clone()) {
                            dead.push(surface_id.clone());
                            break;
                        }
                    }
                }
            }
        }
        for surface_id in dead {
            self.mark_disconnected(&surface_id).await;
        }
    }

    /// Full state to every ready surface.
    async fn broadcast_snapshot(&self) {
        let state = self.current_state().await;
        *self.last.write().await = Some(state.clone());
        self.push_deltas(vec![SyncMessage::Snapshot { state }]).await;
    }

    async fn mark_closed(&self, surface_id: &str) {
        let mut surfaces = self.surfaces.write().await;
        if let Some(entry) = surfaces.get_mut(surface_id) {
            entry.active = false;
            entry.ready = false;
            entry.window_open = false;
            debug!("Surface {} marked inactive", surface_id);
        }
    }

    async fn mark_disconnected(&self, surface_id: &str) {
        let mut surfaces = self.surfaces.write().await;
        if let Some(entry) = surfaces.get_mut(surface_id) {
            entry.tx = None;
            entry.ready = false;
        }
    }
}

/// Fire-and-forget push. Returns false if the receiver is gone.
fn push(surface_id: &str, tx: &mpsc::Sender<SyncMessage>, message: SyncMessage) -> bool {
    let kind = message.kind();
    match tx.try_send(message) {
        Ok(()) => {
            SYNC_PUSHES.with_label_values(&[kind, "sent"]).inc();
            true
        }
        Err(TrySendError::Full(_)) => {
            debug!("Surface {} queue full, dropped {}", surface_id, kind);
            SYNC_PUSHES.with_label_values(&[kind, "dropped"]).inc();
            true
        }
        Err(TrySendError::Closed(_)) => {
            SYNC_PUSHES.with_label_values(&[kind, "dropped"]).inc();
            false
        }
    }
}
