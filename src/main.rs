//! dashora-gateway server entry point.
//!
//! Wires stores, sources and services, starts the background fetch and
//! combine tasks, then serves the REST API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use dashora_gateway::api;
use dashora_gateway::app_state::AppState;
use dashora_gateway::auth::TokenAuthority;
use dashora_gateway::config::{GatewayConfig, LogFormat};
use dashora_gateway::domain::{EventBus, MetricsWindow};
use dashora_gateway::persistence::{
    InMemoryMetricsStore, InMemoryTenantStore, MetricsStore, PostgresPersistence, TenantSeed,
    TenantStore,
};
use dashora_gateway::service::{IngestService, MetricsService, spawn_combiner, spawn_fetch_loop};
use dashora_gateway::sources::{CredentialStore, SourceSet, StaticCredentialStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting dashora-gateway");

    // Build persistence layer
    let (tenants, metrics): (Arc<dyn TenantStore>, Arc<dyn MetricsStore>) =
        if config.persistence_enabled {
            let pg = Arc::new(
                PostgresPersistence::connect(&config)
                    .await
                    .context("connecting to PostgreSQL")?,
            );
            (
                Arc::clone(&pg) as Arc<dyn TenantStore>,
                pg as Arc<dyn MetricsStore>,
            )
        } else {
            tracing::warn!("PERSISTENCE_ENABLED=false: records are kept in memory only");
            (
                Arc::new(InMemoryTenantStore::new()) as Arc<dyn TenantStore>,
                Arc::new(InMemoryMetricsStore::new()) as Arc<dyn MetricsStore>,
            )
        };

    if let Some(path) = &config.tenant_seed_file {
        let seed = TenantSeed::load(path)
            .await
            .with_context(|| format!("loading tenant seed {}", path.display()))?;
        let applied = seed.apply(tenants.as_ref()).await?;
        tracing::info!(domains = applied, "tenant seed applied");
    }

    // Build source layer
    let credentials: Arc<dyn CredentialStore> = match &config.credentials_file {
        Some(path) => {
            let store = StaticCredentialStore::load(path)
                .await
                .with_context(|| format!("loading credentials {}", path.display()))?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("CREDENTIALS_FILE not set: live sources will skip every domain");
            Arc::new(StaticCredentialStore::new())
        }
    };
    let sources = SourceSet::from_config(&config, credentials)?;

    // Build service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let metrics_service = Arc::new(MetricsService::new(
        Arc::clone(&tenants),
        Arc::clone(&metrics),
        event_bus.clone(),
        config.record_ttl_days,
    ));
    let ingest_service = Arc::new(IngestService::new(
        tenants,
        metrics,
        sources,
        event_bus,
        config.fetch_window_days,
        config.record_ttl_days,
    ));

    // Background tasks
    let combine_window = MetricsWindow::from_days(config.fetch_window_days)?;
    let combiner = spawn_combiner(Arc::clone(&metrics_service), combine_window);
    let fetcher = spawn_fetch_loop(
        ingest_service,
        Duration::from_secs(config.fetch_interval_secs),
    );

    // Build application state
    let app_state = AppState {
        metrics_service,
        token_authority: Arc::new(TokenAuthority::new(config.jwt_secret.clone())),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    fetcher.abort();
    combiner.abort();
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
