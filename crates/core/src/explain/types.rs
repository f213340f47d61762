//! Narration cycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayError;

/// Which countdown is (or was last) running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPhase {
    /// Counting down to the scheduled broadcast start.
    #[default]
    Prepare,
    Explain,
    Rest,
}

impl CountdownPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountdownPhase::Prepare => "prepare",
            CountdownPhase::Explain => "explain",
            CountdownPhase::Rest => "rest",
        }
    }
}

/// Countdown as seen by display surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    /// Wall-clock instant the countdown reaches zero, in epoch milliseconds.
    pub target_epoch_ms: Option<i64>,
    pub running: bool,
    pub paused: bool,
    pub paused_remaining_secs: Option<u64>,
    pub phase: CountdownPhase,
}

/// Controller phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    /// Waiting for the scheduled start.
    Preparing,
    Explaining {
        product_id: String,
        started_at: DateTime<Utc>,
    },
    Resting,
    /// A countdown is frozen; `prior` is the phase to go back to.
    Paused {
        remaining_secs: u64,
        prior: Box<CyclePhase>,
    },
}

impl CyclePhase {
    pub fn name(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Preparing => "preparing",
            CyclePhase::Explaining { .. } => "explaining",
            CyclePhase::Resting => "resting",
            CyclePhase::Paused { .. } => "paused",
        }
    }

    /// Product currently on air.
    pub fn explaining_product(&self) -> Option<&str> {
        match self {
            CyclePhase::Explaining { product_id, .. } => Some(product_id),
            _ => None,
        }
    }

    /// Product on air, also while its explain countdown is paused.
    pub fn on_air_product(&self) -> Option<&str> {
        match self {
            CyclePhase::Paused { prior, .. } => prior.on_air_product(),
            other => other.explaining_product(),
        }
    }
}

/// Result of a manual next/prev.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    Moved { index: usize },
    /// Narration started too recently; nothing changed.
    Rejected { remaining_secs: u64 },
    /// Already at the first/last script; nothing changed.
    AtBoundary { index: usize },
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub phase: CyclePhase,
    pub index: usize,
    pub auto_advance: bool,
    pub countdown: CountdownState,
}

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Cannot {op} while {phase}")]
    InvalidState { op: &'static str, phase: &'static str },

    /// Called again within the minimum call spacing.
    #[error("Too fast, retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("No active session")]
    NoActiveSession,

    #[error("No script at position {0}")]
    NoScript(usize),

    #[error("Product {0} is not in the narration list")]
    UnknownProduct(String),

    #[error("Product {0} is not being explained")]
    ProductMismatch(String),

    #[error("Session has no upcoming scheduled start")]
    NoSchedule,

    /// An explain begin/end is still waiting on the backend.
    #[error("Another narration call is still in progress")]
    CallInFlight,

    /// Stop or reset happened while the call was waiting on the backend.
    #[error("Narration was stopped during {0}")]
    Interrupted(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serialization() {
        let phase = CyclePhase::Paused {
            remaining_secs: 4,
            prior: Box::new(CyclePhase::Resting),
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["state"], "paused");
        assert_eq!(json["remaining_secs"], 4);
        assert_eq!(json["prior"]["state"], "resting");
    }

    #[test]
    fn test_switch_outcome_serialization() {
        let json = serde_json::to_value(SwitchOutcome::Rejected { remaining_secs: 33 }).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["remaining_secs"], 33);
    }
}
