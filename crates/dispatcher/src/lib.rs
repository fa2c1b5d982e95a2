//! 定时任务调度
//!
//! [`JobScheduler`] 只根据当前时间和历史触发记录计算到期任务，
//! 不产生副作用；[`SchedulerLoop`] 负责按固定节拍驱动它并把到期任务放入执行队列。

pub mod cadence;
pub mod scheduler;
pub mod timer;

pub use cadence::{Cadence, CadenceKind};
pub use scheduler::{JobScheduler, ScheduledJobInfo, SharedScheduler};
pub use timer::SchedulerLoop;
