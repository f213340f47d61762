//! Script generation configuration.

use serde::{Deserialize, Serialize};

use super::{DEFAULT_PROMPT, DEFAULT_TEMPLATE};

/// Configuration for narration script generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Text generator endpoint. When absent every script uses the template.
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,

    /// Pause between consecutive generator calls (milliseconds).
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_ms: u64,

    /// Fallback script; `{title}`, `{shop}` and `{price}` are substituted.
    #[serde(default = "default_template")]
    pub template: String,

    /// Prompt sent to the generator; same placeholders as `template`.
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

fn default_inter_call_delay() -> u64 {
    1200
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            generator: None,
            inter_call_delay_ms: default_inter_call_delay(),
            template: default_template(),
            prompt: default_prompt(),
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// e.g. "https://api.openai.com" or a local gateway
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    400
}

fn default_temperature() -> f32 {
    0.8
}
