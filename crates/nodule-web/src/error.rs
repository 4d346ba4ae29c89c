//! API错误响应

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use nodule_core::NoduleError;
use serde_json::json;
use tracing::error;

/// 处理器统一错误，包装核心错误并映射为HTTP状态码
#[derive(Debug)]
pub struct ApiError(pub NoduleError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn not_found(message: &str) -> Self {
        ApiError(NoduleError::NotFound(message.to_string()))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(NoduleError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            NoduleError::Validation(_) => StatusCode::BAD_REQUEST,
            NoduleError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            NoduleError::NotFound(_) => StatusCode::NOT_FOUND,
            NoduleError::Conflict(_) | NoduleError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            NoduleError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<NoduleError> for ApiError {
    fn from(err: NoduleError) -> Self {
        ApiError(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError(NoduleError::PayloadTooLarge(err.body_text()));
        }
        ApiError(NoduleError::Validation(format!("Invalid multipart body: {}", err.body_text())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "success": false,
            "error": self.0.message(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError(NoduleError::Unauthorized("x".into())).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError(NoduleError::InvalidStateTransition { from: "pending".into(), event: "Reopened".into() }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError(NoduleError::Database("x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError(NoduleError::PayloadTooLarge("x".into())).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
