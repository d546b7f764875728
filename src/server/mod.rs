//! # HTTP Server
//!
//! axum router exposing the chat relay, suggestion and catalog endpoints.
//! Routes are mounted both at the root and under `/api` so existing web
//! clients keep working.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.4.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: `/saints` listing, `/api` aliases
//! - 1.0.0: Initial release

pub mod error;
pub mod handlers;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::config::{Config, RelayFormat};
use crate::features::personas::SaintCatalog;
use crate::features::relay::{CompletionBackend, OpenAiBackend, Relay, RelayOptions};
use crate::features::suggestions::SuggestionService;

pub use error::ApiError;

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<SaintCatalog>,
    pub relay: Arc<Relay>,
    pub suggestions: Arc<SuggestionService>,
    pub format: RelayFormat,
}

impl AppState {
    pub fn new(
        catalog: Arc<SaintCatalog>,
        backend: Arc<dyn CompletionBackend>,
        options: RelayOptions,
        format: RelayFormat,
    ) -> Self {
        Self {
            relay: Arc::new(Relay::new(catalog.clone(), backend.clone(), options)),
            suggestions: Arc::new(SuggestionService::new(backend)),
            catalog,
            format,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = match &config.saints_config_path {
            Some(path) => {
                let catalog = SaintCatalog::load(path)?;
                info!("📖 Loaded {} saints from {path}", catalog.len());
                catalog
            }
            None => SaintCatalog::new(),
        };

        let backend = OpenAiBackend::from_config(config)?;
        info!("Using model {} at {}", backend.model(), config.openai_base_url);

        let options = RelayOptions {
            deadline: config.relay_timeout,
            strip_suggestions: config.strip_suggestions,
            strict_saints: config.strict_personas,
            hardened_prompts: config.hardened_prompts,
        };

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(backend),
            options,
            config.relay_format,
        ))
    }
}

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/chat", get(handlers::chat_health).post(handlers::chat))
        .route("/suggestions", post(handlers::suggestions))
        .route("/saints", get(handlers::list_saints));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(state)
}

/// Bind and serve until ctrl-c
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Saint chat relay listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
