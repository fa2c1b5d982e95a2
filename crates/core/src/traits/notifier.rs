use async_trait::async_trait;

use crate::{models::Notification, PipelineResult};

/// 外部消息服务
///
/// 每次调用对应一次出站请求，失败时返回 [`crate::PipelineError::Dispatch`]，重试由调用方负责。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> PipelineResult<()>;

    fn name(&self) -> &str;
}
