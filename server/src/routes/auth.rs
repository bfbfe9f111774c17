// Auth passthrough routes
//
// Sessions are issued by the hosted auth service; this layer only reshapes
// its answers and maps failures to the status codes the frontend expects.

use audria_core::hosted::{AuthSession, AuthUser};
use audria_core::AudriaError;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::{BearerToken, CurrentUser};
use crate::AppState;

const RESET_SENT_MESSAGE: &str =
    "If an account with this email exists, you will receive a password reset email shortly.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route("/refresh", post(refresh))
        .route("/signout", post(sign_out))
        .route("/me", get(me))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/status", get(status))
}

#[derive(Debug, Deserialize)]
struct SignUpBody {
    email: String,
    password: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignInBody {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordBody {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordBody {
    access_token: String,
    new_password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionView>,
}

#[derive(Debug, Serialize)]
struct SessionView {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    token_type: String,
    user: AuthUser,
}

impl From<AuthSession> for SessionView {
    fn from(s: AuthSession) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            expires_in: s.expires_in,
            token_type: s.token_type,
            user: s.user,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Failures from the auth service surface with a fixed status; an
/// unconfigured backend stays a 503.
fn reject(status: StatusCode, prefix: Option<&str>) -> impl FnOnce(AudriaError) -> ApiError + '_ {
    move |e| match e {
        AudriaError::Unavailable(_) | AudriaError::Config(_) => ApiError::Core(e),
        other => {
            let msg = match prefix {
                Some(p) => format!("{p}: {other}"),
                None => other.to_string(),
            };
            ApiError::Status(status, msg)
        }
    }
}

fn check_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ApiError::Status(
            StatusCode::UNPROCESSABLE_ENTITY,
            "value is not a valid email address".into(),
        ))
    }
}

async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpBody>,
) -> ApiResult<Json<AuthResponse>> {
    let email = check_email(&body.email)?;
    let name = body.name.as_deref().filter(|n| !n.trim().is_empty());
    let outcome = state
        .auth
        .sign_up(&email, &body.password, name)
        .await
        .map_err(reject(StatusCode::BAD_REQUEST, None))?;
    info!(target: "http", email = %email, confirmed = outcome.session.is_some(), "User signed up");
    Ok(Json(AuthResponse {
        success: true,
        message: "User created successfully. Please check your email for verification.".into(),
        session: outcome.session.map(SessionView::from),
    }))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInBody>,
) -> ApiResult<Json<AuthResponse>> {
    let email = check_email(&body.email)?;
    let session = state
        .auth
        .sign_in(&email, &body.password)
        .await
        .map_err(reject(StatusCode::UNAUTHORIZED, None))?;
    Ok(Json(AuthResponse {
        success: true,
        message: "Signed in successfully".into(),
        session: Some(session.into()),
    }))
}

/// The bearer credential on this route is the refresh token, not an access token
async fn refresh(
    State(state): State<AppState>,
    BearerToken(refresh_token): BearerToken,
) -> ApiResult<Json<AuthResponse>> {
    let session = state
        .auth
        .refresh_session(&refresh_token)
        .await
        .map_err(reject(StatusCode::UNAUTHORIZED, Some("Token refresh failed")))?;
    Ok(Json(AuthResponse {
        success: true,
        message: "Token refreshed successfully".into(),
        session: Some(session.into()),
    }))
}

async fn sign_out(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .sign_out(&caller.access_token)
        .await
        .map_err(reject(StatusCode::BAD_REQUEST, None))?;
    info!(target: "http", user_id = %caller.user_id, "User signed out");
    Ok(MessageResponse::ok("Signed out successfully"))
}

async fn me(CurrentUser(caller): CurrentUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "user": { "id": caller.user_id, "email": caller.email },
    }))
}

/// Always answers with the same message so account existence is not revealed
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordBody>,
) -> Json<MessageResponse> {
    let email = body.email.trim().to_lowercase();
    let redirect_to = format!("{}/reset-password", state.config.frontend_url);
    if let Err(e) = state.auth.send_password_reset(&email, &redirect_to).await {
        warn!(target: "http", error = %e, "Password reset request failed");
    }
    MessageResponse::ok(RESET_SENT_MESSAGE)
}

async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordBody>,
) -> ApiResult<Json<MessageResponse>> {
    if body.new_password.is_empty() {
        return Err(ApiError::bad_request("New password is required"));
    }
    state
        .auth
        .update_password(&body.access_token, &body.new_password)
        .await
        .map_err(reject(StatusCode::BAD_REQUEST, None))?;
    Ok(MessageResponse::ok("Password updated successfully"))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Authentication service is running",
        "supabase_configured": state.auth.is_configured(),
    }))
}
