use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use audria_core::{AppConfig, SupabaseClient, SynthEngines, VoiceService, VoiceStore};
use audria_server::{serve, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,audria_core=info,audria_server=info"));
    fmt().compact().with_env_filter(filter).init();

    let config = AppConfig::load();
    if config.uses_placeholder_jwt_secret() && !config.is_development() {
        tracing::warn!(
            target: "config",
            environment = %config.environment,
            "JWT_SECRET_KEY is still the placeholder value"
        );
    }
    if config.database_url.is_none() {
        tracing::info!(target: "config", "DATABASE_URL not set; apply migrations/ manually");
    }

    let supabase = Arc::new(SupabaseClient::new(config.supabase.clone())?);
    let store = VoiceStore::from_config(&config.voice)?;
    let engines = SynthEngines::detect(&config.voice);
    let voices = VoiceService::new(store, engines);

    tracing::info!(
        target: "config",
        environment = %config.environment,
        addr = %config.bind_addr(),
        supabase_configured = config.supabase.is_configured(),
        upload_dir = %config.voice.upload_dir.display(),
        "Configuration loaded"
    );

    let state = AppState::new(config, supabase.clone(), supabase, voices);
    serve(state).await
}
