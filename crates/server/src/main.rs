use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livedeck_core::script::ChatCompletionGenerator;
use livedeck_core::session::SessionPersistence;
use livedeck_core::sync::{CommandWindowManager, NullWindowManager, WindowManager};
use livedeck_core::{
    load_config, validate_config, CommerceGateway, JdGateway, SqliteSessionPersistence,
    TextGenerator,
};

use livedeck_server::api::create_router;
use livedeck_server::state::{AppState, Collaborators};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("LIVEDECK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Commerce backend
    let gateway: Arc<dyn CommerceGateway> = Arc::new(
        JdGateway::new(config.gateway.clone()).context("Failed to create commerce gateway")?,
    );
    info!("Commerce gateway: {} ({})", gateway.name(), config.gateway.base_url);

    // Session history persistence (non-fatal)
    let persistence: Option<Arc<dyn SessionPersistence>> =
        match SqliteSessionPersistence::new(&config.database.path) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                warn!(
                    "Session history persistence unavailable, running in memory: {}",
                    e
                );
                None
            }
        };

    // Script generator if configured
    let generator: Option<Arc<dyn TextGenerator>> = match &config.script.generator {
        Some(generator_config) => match ChatCompletionGenerator::new(generator_config.clone()) {
            Ok(g) => {
                info!("Script generator: {}", generator_config.model);
                Some(Arc::new(g))
            }
            Err(e) => {
                error!("Failed to create script generator, using templates: {}", e);
                None
            }
        },
        None => {
            info!("No script generator configured, using templates");
            None
        }
    };

    // Surface windows
    let windows: Arc<dyn WindowManager> = match &config.window {
        Some(window_config) => {
            info!("Surface windows launched with {}", window_config.command);
            Arc::new(CommandWindowManager::new(window_config.clone()))
        }
        None => {
            info!("No window launcher configured, surfaces are opened externally");
            Arc::new(NullWindowManager::new())
        }
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Collaborators {
            gateway,
            windows,
            persistence,
            generator,
        },
    ));

    let restored = state.store().restore().await;
    info!("Session history: {} sessions restored", restored);

    state
        .hub()
        .start()
        .await
        .context("Failed to start sync hub")?;

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    state.controller().stop().await;
    state.hub().stop().await;
    state.store().checkpoint_best_effort().await;
    info!("Session history saved");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
