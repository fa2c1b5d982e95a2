use std::time::Duration;

use async_trait::async_trait;

use crate::PipelineResult;

/// 共享键值状态存储
///
/// 单飞锁、告警冷却标记与任务运行记录的唯一事实来源。所有变更都必须通过
/// 原子的条件写入 / 比较删除完成，执行器可能分布在多个进程或主机上。
///
/// 存储不可达时实现返回 [`crate::PipelineError::StoreUnavailable`]，由调用方决定降级策略。
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> PipelineResult<Option<String>>;

    /// 无条件写入，带过期时间
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> PipelineResult<()>;

    /// 键不存在时写入，返回是否写入成功
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> PipelineResult<bool>;

    /// 当前值等于 `expected` 时删除，返回是否删除
    async fn delete_if_equals(&self, key: &str, expected: &str) -> PipelineResult<bool>;

    async fn delete(&self, key: &str) -> PipelineResult<bool>;

    async fn exists(&self, key: &str) -> PipelineResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ping(&self) -> PipelineResult<()>;

    /// 清理已过期的键，返回清理数量。自带过期机制的后端不需要实现
    async fn purge_expired(&self) -> PipelineResult<usize> {
        Ok(0)
    }

    fn backend_name(&self) -> &'static str;
}
