use serde::{Deserialize, Serialize};

/// Narration cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Manual "next" is refused for this long after narration starts while
    /// auto-advance is on.
    #[serde(default = "default_min_explain_duration")]
    pub min_explain_duration_secs: u64,
    /// Minimum spacing between explain begin/end calls to the backend.
    #[serde(default = "default_min_call_spacing")]
    pub min_call_spacing_ms: u64,
    /// Rest between two products when auto-advancing.
    #[serde(default = "default_rest_duration")]
    pub rest_duration_secs: u64,
    /// Pause between moving to the next script and starting it.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_auto_advance")]
    pub auto_advance: bool,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// When set (and auto-advance is on), narration ends by itself after
    /// this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain_duration_secs: Option<u64>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            min_explain_duration_secs: default_min_explain_duration(),
            min_call_spacing_ms: default_min_call_spacing(),
            rest_duration_secs: default_rest_duration(),
            settle_delay_ms: default_settle_delay(),
            auto_advance: default_auto_advance(),
            tick_interval_ms: default_tick_interval(),
            explain_duration_secs: None,
        }
    }
}

fn default_min_explain_duration() -> u64 {
    63
}

fn default_min_call_spacing() -> u64 {
    1500
}

fn default_rest_duration() -> u64 {
    10
}

fn default_settle_delay() -> u64 {
    1000
}

fn default_auto_advance() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    1000
}
