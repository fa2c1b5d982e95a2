use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::PipelineResult;

/// 单次运行的上下文
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_name: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

/// 定时任务处理逻辑
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 处理器标识，与配置中的 `handler` 字段对应
    fn name(&self) -> &str;

    async fn run(&self, ctx: &JobContext) -> PipelineResult<()>;

    fn description(&self) -> &str {
        ""
    }
}
