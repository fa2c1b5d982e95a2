//! 任务执行
//!
//! [`JobExecutor`] 以单飞锁保证同一任务同一时间只有一个运行实例，
//! [`WorkerPool`] 从调度队列取任务名并提交给执行器。

pub mod executor;
pub mod handlers;
pub mod pool;

pub use executor::{default_owner, JobExecutor, SubmitOutcome};
pub use handlers::{CleanupStaleDataJob, HandlerRegistry, ProcessHealthDataJob, ProcessSummary};
pub use pool::WorkerPool;
