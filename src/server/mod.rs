//! HTTP surface: the streaming debate endpoint, a JSON transcript endpoint,
//! and the embedded browser client.

mod handlers;
mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::persona::{PersonaLoadError, PersonaRegistry};
use crate::core::providers::ProviderSession;

pub use types::{RunSettings, SimulateRequest, TranscriptResponse};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    personas: PersonaRegistry,
    config: Arc<Config>,
    session: Option<ProviderSession>,
    client: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Config,
        session: Option<ProviderSession>,
        client: reqwest::Client,
    ) -> Result<Self, PersonaLoadError> {
        Ok(Self {
            personas: PersonaRegistry::from_config(&config)?,
            config: Arc::new(config),
            session,
            client,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/simulate", post(handlers::simulate))
        .route("/api/transcript", post(handlers::transcript))
        .route("/api/personas", get(handlers::personas))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `bind` and serve until ctrl-c.
pub async fn serve(state: AppState, bind: &str) -> Result<(), std::io::Error> {
    let provider = state
        .session
        .as_ref()
        .map(|session| session.mode.as_str())
        .unwrap_or("none");
    let listener = TcpListener::bind(bind).await?;
    info!(
        address = %listener.local_addr()?,
        provider,
        engine = state.config.engine().as_str(),
        "Listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received ctrl-c, shutting down"),
        Err(err) => {
            warn!(error = %err, "Unable to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
