//! # Pipeline API
//!
//! 健康数据流水线的 HTTP 接口，基于 Axum 构建，只提供只读的运维查询：
//!
//! - `GET /health` - 健康检查（包含状态存储连通性）
//! - `GET /metrics` - Prometheus 文本格式指标
//! - `GET /api/jobs` - 已注册的定时任务及下次触发时间
//! - `GET /api/jobs/{name}/last-run` - 任务最近一次运行记录

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tracing::info;

use middleware::{cors_layer, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建带中间件的API应用
pub fn create_app(state: AppState) -> Router {
    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer()),
    )
}

/// 在给定监听器上运行API服务，收到关闭信号后停止接收新请求
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("API服务器监听地址: {}", local_addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("API服务器收到关闭信号");
        })
        .await?;
    Ok(())
}
