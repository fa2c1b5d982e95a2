use serde::{Deserialize, Serialize};

/// 配置中的定时任务定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    /// CRON表达式或 `every N minutes` 形式的固定间隔
    pub cadence: String,
    /// 处理器标识，对应执行器中注册的 JobHandler
    pub handler: String,
    /// 单次运行的最长时间，未设置时使用执行器默认值
    #[serde(default)]
    pub max_duration_seconds: Option<u64>,
}

impl JobDefinition {
    pub fn new(
        name: impl Into<String>,
        cadence: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cadence: cadence.into(),
            handler: handler.into(),
            max_duration_seconds: None,
        }
    }

    pub fn with_max_duration(mut self, seconds: u64) -> Self {
        self.max_duration_seconds = Some(seconds);
        self
    }
}
