//! 告警路由
//!
//! 对每条健康事件按通道配置顺序逐一判断是否告警，只有启用且命中规则的通道在没有
//! 生效中的冷却标记时才产生告警决策。冷却标记在发送之前写入，发送失败不会回滚。

pub mod notifier;
pub mod retry;
pub mod router;
pub mod rules;
pub mod snapshot;

pub use notifier::{HttpNotifier, LoggingNotifier};
pub use retry::RetryPolicy;
pub use router::{AlertRouter, DispatchOutcome, RouteReport};
pub use rules::RuleSet;
pub use snapshot::ChannelSnapshot;
