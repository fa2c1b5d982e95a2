use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::sections::{
    AlertingConfig, ApiConfig, DatabaseConfig, ExecutorConfig, ProcessingConfig,
    SchedulerConfig, StateStoreConfig,
};

/// 系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub state_store: StateStoreConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
    pub processing: ProcessingConfig,
    pub alerting: AlertingConfig,
    pub api: ApiConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// `config_path` 为 None 时依次尝试默认路径，均不存在则只使用内置默认值。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/pipeline.toml",
                "pipeline.toml",
                "/etc/health-pipeline/config.toml",
            ];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PIPELINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.state_store
            .validate()
            .context("状态存储配置验证失败")?;
        self.database.validate().context("数据库配置验证失败")?;
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.executor.validate().context("执行器配置验证失败")?;
        self.processing.validate().context("数据处理配置验证失败")?;
        self.alerting.validate().context("告警配置验证失败")?;
        self.api.validate().context("API配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::models::{Comparator, MetricKind};

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.jobs.len(), 2);
        assert_eq!(config.scheduler.jobs[0].name, "process-health-data");
        assert_eq!(config.scheduler.jobs[0].cadence, "every 10 minutes");
        assert_eq!(config.executor.run_retention_seconds, 86400);
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [state_store]
            backend = "memory"

            [executor]
            worker_count = 2

            [[scheduler.jobs]]
            name = "nightly-cleanup"
            cadence = "0 30 2 * * *"
            handler = "cleanup_stale_data"

            [[alerting.rules]]
            name = "spo2_low"
            metric_kind = "blood_oxygen"
            comparator = "lt"
            threshold = 92.0
            channels = [1]
            "#,
        )
        .unwrap();

        assert_eq!(config.state_store.backend, "memory");
        assert_eq!(config.state_store.key_prefix, "health_pipeline");
        assert_eq!(config.executor.worker_count, 2);
        assert_eq!(config.executor.default_max_duration_seconds, 600);
        assert_eq!(config.scheduler.jobs.len(), 1);
        assert_eq!(config.scheduler.jobs[0].max_duration_seconds, None);
        assert_eq!(config.alerting.rules.len(), 1);
        assert_eq!(config.alerting.rules[0].metric_kind, MetricKind::BloodOxygen);
        assert_eq!(config.alerting.rules[0].comparator, Comparator::Lt);
    }

    #[test]
    fn test_invalid_sections_rejected() {
        assert!(AppConfig::from_toml("[state_store]\nbackend = \"etcd\"").is_err());
        assert!(AppConfig::from_toml("[executor]\nworker_count = 0").is_err());
        assert!(AppConfig::from_toml("[api]\nbind_address = \"not-an-address\"").is_err());
        assert!(AppConfig::from_toml(
            "[alerting]\nendpoint = \"ftp://example.com\""
        )
        .is_err());
    }

    #[test]
    fn test_misfire_grace_must_cover_tick_interval() {
        assert!(AppConfig::from_toml("[scheduler]\nmisfire_grace_seconds = 0").is_err());
        assert!(AppConfig::from_toml(
            "[scheduler]\ntick_interval_ms = 120000\nmisfire_grace_seconds = 60"
        )
        .is_err());
        assert!(AppConfig::from_toml(
            "[scheduler]\ntick_interval_ms = 60000\nmisfire_grace_seconds = 60"
        )
        .is_err());

        let config = AppConfig::from_toml(
            "[scheduler]\ntick_interval_ms = 30000\nmisfire_grace_seconds = 60",
        )
        .unwrap();
        assert_eq!(config.scheduler.misfire_grace_seconds, 60);
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [[alerting.rules]]
            name = "dup"
            metric_kind = "heart_rate"
            comparator = "gt"
            threshold = 100.0

            [[alerting.rules]]
            name = "dup"
            metric_kind = "heart_rate"
            comparator = "lt"
            threshold = 40.0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[state_store]\nbackend = \"memory\"\nkey_prefix = \"test\"\n\n[api]\nenabled = false"
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.state_store.backend, "memory");
        assert_eq!(config.state_store.key_prefix, "test");
        assert!(!config.api.enabled);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AppConfig::load(Some("/nonexistent/pipeline.toml")).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.scheduler.jobs, config.scheduler.jobs);
    }
}
