//! 配置加载
//!
//! 加载顺序：
//! 1. 内置默认值（serde default）
//! 2. 配置文件（TOML格式）
//! 3. 环境变量覆盖（前缀 `PIPELINE_`，层级分隔符 `__`，例如 `PIPELINE_STATE_STORE__URL`）

mod app_config;
mod sections;

pub use app_config::*;
pub use sections::*;
