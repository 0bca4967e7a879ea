//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sitecraft_core::assets::{AssetGenerator, OpenAiImageGenerator, PlaceholderAssets};
use sitecraft_core::config::{ServerSection, SiteConfig};
use sitecraft_core::harness::{HarnessInjector, HarnessOptions};
use sitecraft_core::orchestrator::{GenerationSettings, Generator, ProviderChain};
use sitecraft_core::render::PreviewRenderer;
use sitecraft_core::sanitize::Sanitizer;
use sitecraft_core::version::{MemoryVersionStore, VersionLedger, VersionResolver, VersionStore};
use sitecraft_core::SiteError;

use super::routes;
use crate::db::{create_pool, PgVersionStore};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSection::default())
    }
}

impl From<&ServerSection> for ServerConfig {
    fn from(section: &ServerSection) -> Self {
        Self {
            bind_addr: section.bind_addr,
            cors_permissive: section.cors_permissive,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
    pub resolver: VersionResolver,
    pub renderer: PreviewRenderer,
}

impl AppState {
    /// The generator should append through a ledger over the same `store`.
    pub fn new(
        generator: Generator,
        store: Arc<dyn VersionStore>,
        sanitizer: Sanitizer,
        harness: HarnessInjector,
    ) -> Self {
        Self {
            generator: Arc::new(generator),
            resolver: VersionResolver::new(store.clone()),
            renderer: PreviewRenderer::new(store, sanitizer, harness),
        }
    }

    /// Wire the full pipeline from configuration.
    pub fn from_config(config: &SiteConfig, store: Arc<dyn VersionStore>) -> Result<Self, ServerError> {
        let chain = ProviderChain::from_config(config)?;
        tracing::info!(providers = ?chain.names(), "provider chain ready");

        let assets: Arc<dyn AssetGenerator> = match OpenAiImageGenerator::from_config(&config.assets) {
            Some(generator) if config.assets.enabled => Arc::new(generator),
            _ => {
                tracing::info!("image generation disabled, anchors get placeholder images");
                Arc::new(PlaceholderAssets)
            }
        };

        let generator = Generator::new(chain, GenerationSettings::from(config))
            .with_ledger(VersionLedger::new(store.clone()))
            .with_assets(assets);

        Ok(Self::new(
            generator,
            store,
            Sanitizer::new(&config.sanitizer),
            HarnessInjector::new(HarnessOptions::from(&config.harness)),
        ))
    }
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        // Localhost only
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:3030"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://127.0.0.1:3030"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(routes::health::router())
        .merge(routes::generate::router())
        .merge(routes::artifacts::router())
        .merge(routes::preview::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn run_server(state: AppState, config: ServerConfig) -> Result<(), ServerError> {
    let app = build_router(state, &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Pick the version store, build the pipeline, and serve.
///
/// An empty `database_url` keeps versions in memory for the process lifetime.
pub async fn serve(config: &SiteConfig) -> Result<(), ServerError> {
    let store: Arc<dyn VersionStore> = if config.server.database_url.trim().is_empty() {
        tracing::warn!("No database_url configured, versions are kept in memory only");
        Arc::new(MemoryVersionStore::new())
    } else {
        let pool = create_pool(&config.server.database_url).await?;
        Arc::new(PgVersionStore::new(pool))
    };

    let state = AppState::from_config(config, store)?;
    run_server(state, ServerConfig::from(&config.server)).await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }

    // Let in-flight background persistence finish writing.
    tokio::time::sleep(Duration::from_millis(250)).await;
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("pipeline setup failed: {0}")]
    Pipeline(#[from] SiteError),
}
