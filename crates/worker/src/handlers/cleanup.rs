use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::info;

use pipeline_core::{
    config::CLEANUP_STALE_DATA_HANDLER, HealthEventSource, JobContext, JobHandler, PipelineResult,
};

/// 删除超过保留期的健康数据
pub struct CleanupStaleDataJob {
    source: Arc<dyn HealthEventSource>,
    retention: Duration,
}

impl CleanupStaleDataJob {
    pub fn new(source: Arc<dyn HealthEventSource>, retention_days: i64) -> Self {
        Self {
            source,
            retention: Duration::days(retention_days),
        }
    }
}

#[async_trait]
impl JobHandler for CleanupStaleDataJob {
    fn name(&self) -> &str {
        CLEANUP_STALE_DATA_HANDLER
    }

    async fn run(&self, ctx: &JobContext) -> PipelineResult<()> {
        let cutoff = Utc::now() - self.retention;
        let deleted = self.source.prune_before(cutoff).await?;
        info!(
            run_id = %ctx.run_id,
            cutoff = %cutoff,
            "清理过期健康数据 {} 条",
            deleted
        );
        Ok(())
    }

    fn description(&self) -> &str {
        "删除超过保留期的健康数据"
    }
}
