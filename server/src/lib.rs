// Audria HTTP server
//
// Exposes auth passthrough, person profiles and voice assets over REST

pub mod error;
pub mod extract;
pub mod routes;

use audria_core::{AppConfig, AuthBackend, PersonRepository, VoiceService};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub use error::{ApiError, ApiResult};

pub const SERVICE_NAME: &str = "Audria API";
pub const SERVICE_VERSION: &str = "1.0.0";

const BODY_LIMIT_SLACK: u64 = 1024 * 1024;
const MAX_PRUNE_INTERVAL_SECS: u64 = 600;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<dyn AuthBackend>,
    pub persons: Arc<dyn PersonRepository>,
    pub voices: Arc<VoiceService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        auth: Arc<dyn AuthBackend>,
        persons: Arc<dyn PersonRepository>,
        voices: VoiceService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            auth,
            persons,
            voices: Arc::new(voices),
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    if config.is_development() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }
    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);
    match HeaderValue::from_str(&config.frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(
                target: "http",
                frontend_url = %config.frontend_url,
                error = %e,
                "FRONTEND_URL is not a valid origin; cross-origin requests will be refused"
            );
            layer
        }
    }
}

/// Assemble the full API router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .voices
        .store()
        .max_file_size()
        .saturating_add(BODY_LIMIT_SLACK);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    routes::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve and shut down on Ctrl-C / SIGTERM
pub async fn serve(state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = state.config.bind_addr();
    info!(target: "http", addr = %addr, "Starting Audria API server");

    // Periodically drop generated audio nobody fetched
    let ttl = state.config.voice.temp_ttl_secs;
    let every = ttl.clamp(1, MAX_PRUNE_INTERVAL_SECS);
    let voices = state.voices.clone();
    let pruner = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every));
        loop {
            interval.tick().await;
            match voices.store().prune_temp(Duration::from_secs(ttl)).await {
                Ok(n) if n > 0 => debug!(target: "http", removed = n, "Pruned temp audio"),
                Ok(_) => {}
                Err(e) => warn!(target: "http", error = %e, "Temp prune failed"),
            }
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(target: "http", url = %format!("http://{}", addr), "Audria API ready");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    pruner.abort();
    info!(target: "http", "Server stopped");
    result?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "http", error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(target: "http", error = %e, "Failed to listen for SIGTERM");
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
    info!(target: "http", "Shutdown signal received");
}
