mod auth;
mod health;
mod persons;
mod voices;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/auth", auth::router())
        .nest("/api/persons", persons::router())
        .nest("/api/voices", voices::router())
}
