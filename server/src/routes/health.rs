use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::{AppState, SERVICE_NAME, SERVICE_VERSION};

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
    }))
}
