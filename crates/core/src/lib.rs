pub mod catalog;
pub mod config;
pub mod events;
pub mod explain;
pub mod gateway;
pub mod ingest;
pub mod metrics;
pub mod script;
pub mod session;
pub mod sync;
pub mod testing;

pub use catalog::{
    CatalogError, ParsedCatalog, ProductCatalogLoader, ProductFile, ProductFileRegistry, Quota,
    TextCatalogLoader,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use events::{BroadcastBus, EventBus, LiveEvent, NoticeLevel};
pub use explain::{
    ControllerSnapshot, CountdownPhase, CountdownState, CyclePhase, ExplainConfig,
    ExplainCycleController, ExplainError, SwitchOutcome,
};
pub use gateway::{CommerceGateway, GatewayError, JdGateway, ProductDetail};
pub use ingest::{BatchIngestionEngine, IngestConfig, IngestError, IngestionReport};
pub use script::{ScriptConfig, ScriptReport, ScriptWriter, TextGenError, TextGenerator};
pub use session::{
    AIScript, LiveProduct, LiveSession, LiveSessionStore, SessionError, SessionSummary,
    SessionView, SqliteSessionPersistence,
};
pub use sync::{ScreenSyncHub, SurfaceSignal, SurfaceState, SyncConfig, SyncError, SyncMessage};
