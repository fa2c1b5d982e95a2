use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use pipeline_core::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("流水线错误: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("未找到资源: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::NotFound(_) | ApiError::Pipeline(PipelineError::JobNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            ApiError::Pipeline(e) if e.is_store_unavailable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
            ApiError::Pipeline(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!("API请求失败: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": self.to_string(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
