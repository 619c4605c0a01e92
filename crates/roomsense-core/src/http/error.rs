//! ApiError - GatewayError と axum の rejection を JSON エラーに変換する
//!
//! 本文は常に `{"status": "error", "message": <text>}`。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::domain::{ErrorKind, GatewayError};

#[derive(Debug)]
pub enum ApiError {
    Gateway(GatewayError),
    /// ボディの読み取りなど、ドメインに届く前に axum が拒否したもの
    Rejected { status: StatusCode, message: String },
}

impl ApiError {
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(err) => status_for(err),
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

pub fn status_for(err: &GatewayError) -> StatusCode {
    match err.kind() {
        ErrorKind::Client => StatusCode::BAD_REQUEST,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Missing => StatusCode::NOT_FOUND,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Gateway(err) => {
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                }
                err.to_string()
            }
            ApiError::Rejected { message, .. } => message,
        };
        (status, Json(json!({"status": "error", "message": message}))).into_response()
    }
}
