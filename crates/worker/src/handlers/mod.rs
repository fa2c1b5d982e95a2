//! 内置任务处理器与处理器注册表

mod cleanup;
mod process_health_data;
mod registry;

pub use cleanup::CleanupStaleDataJob;
pub use process_health_data::{ProcessHealthDataJob, ProcessSummary};
pub use registry::HandlerRegistry;
