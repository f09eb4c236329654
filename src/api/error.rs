//! HTTP 错误响应，统一为 `{"error": "..."}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::error::AppError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    /// 参数错误 / 未找到原样返回；其余错误记录日志后对外只返回 `internal_message`
    pub fn from_app(err: AppError, internal_message: &str) -> Self {
        match err {
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            AppError::NotFound(msg) => ApiError::NotFound(msg),
            other => {
                error!("❌ {}: {}", internal_message, other);
                ApiError::Internal(internal_message.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
