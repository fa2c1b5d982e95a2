use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use pipeline_core::{JobHandler, PipelineError, PipelineResult};

/// 处理器标识到处理器实例的映射
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) -> PipelineResult<()> {
        let id = handler.name().to_string();
        if self.handlers.contains_key(&id) {
            return Err(PipelineError::Configuration(format!(
                "处理器重复注册: {id}"
            )));
        }
        info!("注册任务处理器: {} {}", id, handler.description());
        self.handlers.insert(id, handler);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(id).cloned()
    }

    /// 按标识查找处理器，不存在时返回配置错误
    pub fn resolve(&self, id: &str) -> PipelineResult<Arc<dyn JobHandler>> {
        self.get(id).ok_or_else(|| PipelineError::UnknownHandler {
            handler: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
