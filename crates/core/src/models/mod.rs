//! # 数据模型
//!
//! 健康数据流水线的核心数据结构：定时任务定义、任务运行记录、告警通道、健康事件与告警决策。
//!
//! - [`JobDefinition`] 来自配置，注册后不可变
//! - [`JobRun`] 由执行器创建，保存在状态存储中并带有保留期
//! - [`AlertChannel`] 由外部配置维护，对流水线只读
//! - [`HealthEvent`] 由数据采集方写入，每个处理周期消费一次
//! - [`AlertDecision`] 派生数据，只以冷却标记的形式落入状态存储

pub mod alert;
pub mod health;
pub mod job;
pub mod job_run;

pub use alert::*;
pub use health::*;
pub use job::*;
pub use job_run::*;
