use thiserror::Error;

/// 流水线错误类型定义
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务名称重复: {name}")]
    DuplicateJob { name: String },

    #[error("无效的调度表达式: {expr} - {message}")]
    InvalidCadence { expr: String, message: String },

    #[error("任务未注册: {name}")]
    JobNotFound { name: String },

    #[error("未知的任务处理器: {handler}")]
    UnknownHandler { handler: String },

    #[error("状态存储不可用: {0}")]
    StoreUnavailable(String),

    #[error("任务执行失败: {0}")]
    HandlerFailure(String),

    #[error("告警发送失败: {0}")]
    Dispatch(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl PipelineError {
    /// 启动阶段必须中止的配置类错误
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_)
                | PipelineError::DuplicateJob { .. }
                | PipelineError::InvalidCadence { .. }
                | PipelineError::UnknownHandler { .. }
        )
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, PipelineError::StoreUnavailable(_))
    }
}

/// 统一的Result类型
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
