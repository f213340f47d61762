//! Messages exchanged with display surfaces.

use serde::{Deserialize, Serialize};

use crate::explain::{CountdownState, CyclePhase};

/// Everything a display surface renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceState {
    pub session_id: Option<String>,
    pub script_index: usize,
    pub product_id: Option<String>,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub script: Option<String>,
    pub countdown: CountdownState,
    pub phase: CyclePhase,
}

/// Hub to surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Full state, sent in answer to `ready` and after missed updates.
    Snapshot { state: SurfaceState },
    ImageChanged { image_url: Option<String> },
    ScriptChanged {
        index: usize,
        product_id: Option<String>,
        title: Option<String>,
        script: Option<String>,
    },
    CountdownChanged { countdown: CountdownState },
    PhaseChanged { phase: CyclePhase },
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Snapshot { .. } => "snapshot",
            SyncMessage::ImageChanged { .. } => "image_changed",
            SyncMessage::ScriptChanged { .. } => "script_changed",
            SyncMessage::CountdownChanged { .. } => "countdown_changed",
            SyncMessage::PhaseChanged { .. } => "phase_changed",
        }
    }
}

/// Surface to hub. Surfaces never change state directly; `next` and `prev`
/// are forwarded to the narration controller as requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceSignal {
    Ready,
    Next,
    Prev,
    Closed,
}
