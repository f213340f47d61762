//! Narration cycle: explain a product, rest, move on to the next one.

mod config;
mod controller;
mod types;

pub use config::ExplainConfig;
pub use controller::ExplainCycleController;
pub use types::{
    ControllerSnapshot, CountdownPhase, CountdownState, CyclePhase, ExplainError, SwitchOutcome,
};
