/// 状态存储键名生成器
///
/// 所有写入状态存储的键都带有统一前缀，便于多个部署共享同一个Redis实例。
#[derive(Debug, Clone)]
pub struct StateKeys {
    prefix: String,
}

impl StateKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with(':') {
            prefix.push(':');
        }
        Self { prefix }
    }

    /// 单飞锁
    pub fn job_lock(&self, job_name: &str) -> String {
        format!("{}lock:job:{}", self.prefix, job_name)
    }

    pub fn job_run(&self, job_name: &str, run_id: &str) -> String {
        format!("{}job_run:{}:{}", self.prefix, job_name, run_id)
    }

    /// 指向最近一次运行记录的指针
    pub fn latest_run(&self, job_name: &str) -> String {
        format!("{}job_run:{}:latest", self.prefix, job_name)
    }

    pub fn last_fired(&self, job_name: &str) -> String {
        format!("{}schedule:last_fired:{}", self.prefix, job_name)
    }

    /// 告警冷却标记，按 (通道, 设备, 原因) 唯一
    pub fn cooldown(&self, channel_id: i64, device_id: &str, reason: &str) -> String {
        format!(
            "{}alert:cooldown:{}:{}:{}",
            self.prefix, channel_id, device_id, reason
        )
    }

    pub fn watermark(&self, stream: &str) -> String {
        format!("{}watermark:{}", self.prefix, stream)
    }
}

impl Default for StateKeys {
    fn default() -> Self {
        Self::new("health_pipeline")
    }
}
