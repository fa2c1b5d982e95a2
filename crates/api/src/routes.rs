use std::sync::Arc;

use axum::{routing::get, Router};

use pipeline_core::StateStore;
use pipeline_dispatcher::SharedScheduler;
use pipeline_infrastructure::{JobRunStore, MetricsRegistry};

use crate::handlers::{
    health::health_check,
    jobs::{get_last_run, list_jobs},
    metrics::export_metrics,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsRegistry>,
    pub store: Arc<dyn StateStore>,
    pub job_runs: JobRunStore,
    pub scheduler: SharedScheduler,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(export_metrics))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{name}/last-run", get(get_last_run))
        .with_state(state)
}
