use std::sync::Arc;

use livedeck_core::catalog::{ProductCatalogLoader, ProductFileRegistry, TextCatalogLoader};
use livedeck_core::session::SessionPersistence;
use livedeck_core::sync::WindowManager;
use livedeck_core::{
    BatchIngestionEngine, BroadcastBus, CommerceGateway, Config, EventBus, ExplainCycleController,
    LiveEvent, LiveSessionStore, SanitizedConfig, ScreenSyncHub, ScriptWriter, TextGenerator,
};

/// External collaborators the server is wired with.
pub struct Collaborators {
    pub gateway: Arc<dyn CommerceGateway>,
    pub windows: Arc<dyn WindowManager>,
    pub persistence: Option<Arc<dyn SessionPersistence>>,
    pub generator: Option<Arc<dyn TextGenerator>>,
}

/// Shared application state
pub struct AppState {
    config: Config,
    events: Arc<BroadcastBus<LiveEvent>>,
    gateway: Arc<dyn CommerceGateway>,
    store: LiveSessionStore,
    files: ProductFileRegistry,
    loader: Box<dyn ProductCatalogLoader>,
    ingestion: BatchIngestionEngine,
    scripts: ScriptWriter,
    controller: ExplainCycleController,
    hub: ScreenSyncHub,
}

impl AppState {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            gateway,
            windows,
            persistence,
            generator,
        } = collaborators;

        let events = Arc::new(BroadcastBus::default());
        let bus: Arc<dyn EventBus<LiveEvent>> = events.clone();

        let mut store = LiveSessionStore::new(config.session.max_history, Arc::clone(&bus))
            .with_fallback_template(config.script.template.clone());
        if let Some(persistence) = persistence {
            store = store.with_persistence(persistence);
        }

        let ingestion =
            BatchIngestionEngine::new(Arc::clone(&gateway), store.clone(), config.ingest.clone());
        let scripts = ScriptWriter::new(config.script.clone(), generator);
        let controller = ExplainCycleController::new(
            Arc::clone(&gateway),
            store.view(),
            Arc::clone(&bus),
            config.explain.clone(),
        );
        let hub = ScreenSyncHub::new(
            store.view(),
            controller.clone(),
            windows,
            bus,
            config.sync.clone(),
        );

        Self {
            config,
            events,
            gateway,
            store,
            files: ProductFileRegistry::new(),
            loader: Box::new(TextCatalogLoader::new()),
            ingestion,
            scripts,
            controller,
            hub,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn events(&self) -> &BroadcastBus<LiveEvent> {
        &self.events
    }

    pub fn gateway(&self) -> &dyn CommerceGateway {
        self.gateway.as_ref()
    }

    pub fn store(&self) -> &LiveSessionStore {
        &self.store
    }

    pub fn files(&self) -> &ProductFileRegistry {
        &self.files
    }

    pub fn loader(&self) -> &dyn ProductCatalogLoader {
        self.loader.as_ref()
    }

    pub fn ingestion(&self) -> &BatchIngestionEngine {
        &self.ingestion
    }

    pub fn scripts(&self) -> &ScriptWriter {
        &self.scripts
    }

    pub fn controller(&self) -> &ExplainCycleController {
        &self.controller
    }

    pub fn hub(&self) -> &ScreenSyncHub {
        &self.hub
    }
}
