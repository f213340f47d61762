use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::explain::ExplainConfig;
use crate::ingest::IngestConfig;
use crate::script::ScriptConfig;
use crate::sync::SyncConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub script: ScriptConfig,
    /// Launcher for display surface windows. When absent, surfaces are
    /// expected to be opened externally (e.g. a capture tool browser source).
    #[serde(default)]
    pub window: Option<WindowConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration (session history checkpoints)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("livedeck.db")
}

/// Session history configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum number of sessions kept in history. Oldest are evicted first.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    20
}

/// Commerce backend gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Backend base URL
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// Session credentials sent as the `Cookie` header
    #[serde(default)]
    pub cookie: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub endpoints: GatewayEndpoints,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            cookie: None,
            timeout_secs: default_gateway_timeout(),
            user_agent: default_user_agent(),
            endpoints: GatewayEndpoints::default(),
        }
    }
}

fn default_gateway_url() -> String {
    "https://drlives.jd.com".to_string()
}

fn default_gateway_timeout() -> u32 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string()
}

/// Backend endpoint paths, relative to `base_url`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayEndpoints {
    #[serde(default = "default_details_path")]
    pub details: String,
    #[serde(default = "default_add_to_cart_path")]
    pub add_to_cart: String,
    #[serde(default = "default_explain_begin_path")]
    pub explain_begin: String,
    #[serde(default = "default_explain_end_path")]
    pub explain_end: String,
    #[serde(default = "default_live_create_path")]
    pub live_create: String,
    #[serde(default = "default_account_path")]
    pub account: String,
    #[serde(default = "default_recent_rooms_path")]
    pub recent_rooms: String,
    #[serde(default = "default_live_stats_path")]
    pub live_stats: String,
    #[serde(default = "default_viewer_url_path")]
    pub viewer_url: String,
}

impl Default for GatewayEndpoints {
    fn default() -> Self {
        Self {
            details: default_details_path(),
            add_to_cart: default_add_to_cart_path(),
            explain_begin: default_explain_begin_path(),
            explain_end: default_explain_end_path(),
            live_create: default_live_create_path(),
            account: default_account_path(),
            recent_rooms: default_recent_rooms_path(),
            live_stats: default_live_stats_path(),
            viewer_url: default_viewer_url_path(),
        }
    }
}

fn default_details_path() -> String {
    "/live-shopping-bag/sku/queryBySkuIds".to_string()
}

fn default_add_to_cart_path() -> String {
    "/live-shopping-bag/sku/add".to_string()
}

fn default_explain_begin_path() -> String {
    "/live/pc/explainBegin".to_string()
}

fn default_explain_end_path() -> String {
    "/live/pc/explainEnd".to_string()
}

fn default_live_create_path() -> String {
    "/live/live-create".to_string()
}

fn default_account_path() -> String {
    "/console/homePage/newGetAuthorInfo".to_string()
}

fn default_recent_rooms_path() -> String {
    "/live/pc/recentUsedIndex".to_string()
}

fn default_live_stats_path() -> String {
    "/liveRealTimeGeneralData/generalData".to_string()
}

fn default_viewer_url_path() -> String {
    "/h5".to_string()
}

/// External launcher used to open display surface windows
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Executable to launch (e.g. a browser in app/kiosk mode)
    pub command: String,
    /// Arguments; `{url}` and `{surface_id}` are substituted per surface
    #[serde(default)]
    pub args: Vec<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub gateway: SanitizedGatewayConfig,
    pub ingest: IngestConfig,
    pub explain: ExplainConfig,
    pub sync: SyncConfig,
    pub script: SanitizedScriptConfig,
    pub window_launcher_configured: bool,
}

/// Sanitized gateway config (cookie hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGatewayConfig {
    pub base_url: String,
    pub cookie_configured: bool,
    pub timeout_secs: u32,
}

/// Sanitized script config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedScriptConfig {
    pub generator_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub api_key_configured: bool,
    pub inter_call_delay_ms: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let generator = config.script.generator.as_ref();
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            session: config.session.clone(),
            gateway: SanitizedGatewayConfig {
                base_url: config.gateway.base_url.clone(),
                cookie_configured: config
                    .gateway
                    .cookie
                    .as_ref()
                    .is_some_and(|c| !c.is_empty()),
                timeout_secs: config.gateway.timeout_secs,
            },
            ingest: config.ingest.clone(),
            explain: config.explain.clone(),
            sync: config.sync.clone(),
            script: SanitizedScriptConfig {
                generator_configured: generator.is_some(),
                model: generator.map(|g| g.model.clone()),
                api_key_configured: generator.is_some_and(|g| g.api_key.is_some()),
                inter_call_delay_ms: config.script.inter_call_delay_ms,
            },
            window_launcher_configured: config.window.is_some(),
        }
    }
}
