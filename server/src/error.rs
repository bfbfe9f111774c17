// HTTP error mapping
//
// Every failure leaves the API as `{"detail": "<message>"}`

use audria_core::AudriaError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] AudriaError),

    #[error("{1}")]
    Status(StatusCode, String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Status(StatusCode::UNAUTHORIZED, msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status(code, _) => *code,
            Self::Core(e) => match e {
                AudriaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                AudriaError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                AudriaError::Forbidden(_) => StatusCode::FORBIDDEN,
                AudriaError::NotFound(_) => StatusCode::NOT_FOUND,
                AudriaError::SynthesisUnavailable(_)
                | AudriaError::Unavailable(_)
                | AudriaError::Config(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                AudriaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                AudriaError::Backend { status, .. } => StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            error!(target: "http", status = status.as_u16(), error = %detail, "Request failed");
        } else {
            warn!(target: "http", status = status.as_u16(), error = %detail, "Request rejected");
        }

        let body = Json(json!({ "detail": detail }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
