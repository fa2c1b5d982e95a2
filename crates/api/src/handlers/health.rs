use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::routes::AppState;

/// 健康检查，状态存储不可达时返回 503
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, store_status) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!("健康检查失败: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    };

    (
        status,
        Json(json!({
            "status": if status.is_success() { "ok" } else { "degraded" },
            "state_store": {
                "backend": state.store.backend_name(),
                "status": store_status,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "health-pipeline",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
