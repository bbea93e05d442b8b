use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subfetch_core::config::normalize_languages;
use subfetch_core::{
    build_providers, load_config, validate_config, AcquisitionPipeline, AcquisitionSettings,
    MediaServer, PlexClient, SceneNameGuesser, SessionActivator, TextLanguageVerifier,
    WebhookService, WorkerPool,
};

use subfetch_server::api::create_router;
use subfetch_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("SUBFETCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration before logging so `[logging]` can pick the format
    let loaded = load_config(&config_path);
    init_logging(loaded.as_ref().is_ok_and(|c| c.logging.json));

    let mut config =
        loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;
    info!("Loaded configuration from {:?}", config_path);

    validate_config(&config).context("Configuration validation failed")?;
    config.subtitles.languages = normalize_languages(&config.subtitles.languages)?;
    info!(
        languages = ?config.subtitles.languages,
        workers = config.workers.max_concurrent,
        "Configuration loaded successfully"
    );

    // Media server
    let plex = PlexClient::new(&config.plex).context("Failed to create Plex client")?;
    let media_server: Arc<dyn MediaServer> = Arc::new(plex);
    info!("Plex client initialized for {}", config.plex.url);

    // Subtitle providers
    let providers = build_providers(&config).context("Failed to create subtitle providers")?;
    info!(
        "Subtitle providers: {}",
        providers
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Acquisition pipeline
    let pipeline = AcquisitionPipeline::new(
        providers,
        Arc::new(TextLanguageVerifier::new()),
        Arc::new(SceneNameGuesser::new()),
        AcquisitionSettings::from(&config.subtitles),
    )
    .context("Failed to create acquisition pipeline")?;

    let activator = SessionActivator::from_config(Arc::clone(&media_server), &config.subtitles)
        .context("Failed to create session activator")?;

    let pool = WorkerPool::new(config.workers.max_concurrent)
        .context("Failed to create worker pool")?;

    let webhooks = Arc::new(WebhookService::new(
        Arc::clone(&media_server),
        Arc::new(pipeline),
        activator,
        pool,
        config.subtitles.auto_select,
    ));

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), webhooks, media_server));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);
    info!("Webhook endpoint: {}", config.server.webhook_path);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
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

    info!("Shutdown signal received");
}
