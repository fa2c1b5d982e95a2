use serde::{Deserialize, Serialize};

use crate::models::{AlertRule, Comparator, JobDefinition, MetricKind};

pub const PROCESS_HEALTH_DATA_HANDLER: &str = "process_health_data";
pub const CLEANUP_STALE_DATA_HANDLER: &str = "cleanup_stale_data";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateStoreConfig {
    /// "redis" 或 "memory"
    pub backend: String,
    pub url: String,
    pub key_prefix: String,
    pub command_timeout_ms: u64,
    /// 进程内存储清理过期键的间隔
    pub sweep_interval_seconds: u64,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "health_pipeline".to_string(),
            command_timeout_ms: 500,
            sweep_interval_seconds: 60,
        }
    }
}

impl StateStoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.backend.as_str() {
            "redis" => {
                if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
                    return Err(anyhow::anyhow!("Redis地址格式无效: {}", self.url));
                }
            }
            "memory" => {}
            other => {
                return Err(anyhow::anyhow!(
                    "不支持的状态存储类型: {other}，支持的类型: [\"redis\", \"memory\"]"
                ))
            }
        }
        if self.command_timeout_ms == 0 {
            return Err(anyhow::anyhow!("状态存储命令超时必须大于0"));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(anyhow::anyhow!("过期键清理间隔必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// 启动时创建流水线使用的表
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/health.db?mode=rwc".to_string(),
            max_connections: 5,
            create_schema: true,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("数据库URL必须以sqlite:开头: {}", self.url));
        }
        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    /// 日历任务错过触发点超过该时长则跳过
    pub misfire_grace_seconds: u64,
    pub queue_capacity: usize,
    pub jobs: Vec<JobDefinition>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            misfire_grace_seconds: 60,
            queue_capacity: 64,
            jobs: vec![
                JobDefinition::new(
                    "process-health-data",
                    "every 10 minutes",
                    PROCESS_HEALTH_DATA_HANDLER,
                )
                .with_max_duration(300),
                JobDefinition::new("cleanup-stale-data", "0 0 0 * * *", CLEANUP_STALE_DATA_HANDLER)
                    .with_max_duration(1800),
            ],
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度检查间隔必须大于0"));
        }
        if self.misfire_grace_seconds == 0 {
            return Err(anyhow::anyhow!("misfire grace 必须大于0"));
        }
        // 两次检查之间的触发点必须仍在 grace 窗口内
        if self.misfire_grace_seconds.saturating_mul(1000) <= self.tick_interval_ms {
            return Err(anyhow::anyhow!(
                "misfire grace ({}s) 必须大于调度检查间隔 ({}ms)",
                self.misfire_grace_seconds,
                self.tick_interval_ms
            ));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow::anyhow!("任务队列容量必须大于0"));
        }
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(anyhow::anyhow!("任务名称不能为空"));
            }
            if job.handler.trim().is_empty() {
                return Err(anyhow::anyhow!("任务 {} 的处理器不能为空", job.name));
            }
            if job.max_duration_seconds == Some(0) {
                return Err(anyhow::anyhow!("任务 {} 的最长运行时间必须大于0", job.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub worker_count: usize,
    pub default_max_duration_seconds: u64,
    /// 锁过期时间 = 最长运行时间 + 该余量
    pub lock_ttl_margin_seconds: u64,
    pub run_retention_seconds: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            default_max_duration_seconds: 600,
            lock_ttl_margin_seconds: 30,
            run_retention_seconds: 24 * 3600,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_count == 0 {
            return Err(anyhow::anyhow!("Worker数量必须大于0"));
        }
        if self.default_max_duration_seconds == 0 {
            return Err(anyhow::anyhow!("默认最长运行时间必须大于0"));
        }
        if self.run_retention_seconds == 0 {
            return Err(anyhow::anyhow!("运行记录保留时间必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub batch_size: usize,
    pub max_batches_per_run: usize,
    /// 健康数据保留天数
    pub retention_days: i64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_batches_per_run: 20,
            retention_days: 30,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 || self.max_batches_per_run == 0 {
            return Err(anyhow::anyhow!("批处理大小和批次数必须大于0"));
        }
        if self.retention_days <= 0 {
            return Err(anyhow::anyhow!("数据保留天数必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    pub refresh_interval_seconds: u64,
    /// 消息服务地址，未配置时只记录日志
    pub endpoint: Option<String>,
    pub request_timeout_seconds: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
    pub rules: Vec<AlertRule>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 60,
            endpoint: None,
            request_timeout_seconds: 10,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            rules: default_rules(),
        }
    }
}

fn default_rules() -> Vec<AlertRule> {
    let rule = |name: &str, metric_kind, comparator, threshold| AlertRule {
        name: name.to_string(),
        metric_kind,
        comparator,
        threshold,
        channels: Vec::new(),
    };
    vec![
        rule("heart_rate_high", MetricKind::HeartRate, Comparator::Gt, 120.0),
        rule("heart_rate_low", MetricKind::HeartRate, Comparator::Lt, 45.0),
        rule("blood_oxygen_low", MetricKind::BloodOxygen, Comparator::Lt, 90.0),
        rule("body_temperature_high", MetricKind::BodyTemperature, Comparator::Ge, 38.5),
        rule("battery_low", MetricKind::BatteryLevel, Comparator::Le, 10.0),
    ]
}

impl AlertingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_interval_seconds == 0 {
            return Err(anyhow::anyhow!("告警通道刷新间隔必须大于0"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("告警发送尝试次数必须大于0"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("退避倍数不能小于1"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(anyhow::anyhow!("抖动系数必须在0到1之间"));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!("消息服务地址格式无效: {endpoint}"));
            }
        }
        let mut names = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return Err(anyhow::anyhow!("告警规则名称不能为空"));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(anyhow::anyhow!("告警规则名称重复: {}", rule.name));
            }
            if !rule.threshold.is_finite() {
                return Err(anyhow::anyhow!("告警规则 {} 的阈值无效", rule.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled && self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!("API监听地址无效: {}", self.bind_address));
        }
        Ok(())
    }
}
