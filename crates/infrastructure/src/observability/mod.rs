//! 可观测性
//!
//! 流水线的指标注册表与 Prometheus 文本格式导出。

pub mod metrics_registry;

pub use metrics_registry::MetricsRegistry;
