use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pipeline_core::{JobRun, PipelineError};

use crate::{
    error::{ApiError, ApiResult},
    response::{success, ApiResponse},
    routes::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    pub cadence: String,
    pub handler: String,
    pub max_duration_seconds: Option<u64>,
    pub last_fired: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
}

/// 列出已注册的定时任务
pub async fn list_jobs(State(state): State<AppState>) -> ApiResponse<Vec<JobSummary>> {
    let scheduler = state.scheduler.read().await;
    let jobs = scheduler
        .jobs(Utc::now())
        .into_iter()
        .map(|job| JobSummary {
            name: job.definition.name,
            cadence: job.definition.cadence,
            handler: job.definition.handler,
            max_duration_seconds: job.definition.max_duration_seconds,
            last_fired: job.last_fired,
            next_fire_time: job.next_fire_time,
        })
        .collect();
    success(jobs)
}

/// 获取任务最近一次运行记录
pub async fn get_last_run(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ApiResponse<JobRun>> {
    if state.scheduler.read().await.definition(&name).is_none() {
        return Err(PipelineError::JobNotFound { name }.into());
    }

    match state.job_runs.latest(&name).await? {
        Some(run) => Ok(success(run)),
        None => Err(ApiError::NotFound(format!("任务 {name} 尚无运行记录"))),
    }
}
