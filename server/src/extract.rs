// Request extractors for bearer-token authentication

use audria_core::hosted::Caller;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Raw bearer token from the `Authorization` header
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .map(|t| BearerToken(t.to_string()))
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}

fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Caller resolved through the auth backend
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        match state.auth.get_user(&token).await {
            Ok(user) => Ok(CurrentUser(Caller {
                user_id: user.id,
                email: user.email,
                access_token: token,
            })),
            Err(e) => {
                debug!(target: "http", error = %e, "Token rejected");
                Err(ApiError::unauthorized("Could not validate credentials"))
            }
        }
    }
}
