//! SQLite 持久化协作方
//!
//! 只包含流水线会读写的两张表：告警通道配置 `alert_config` 与健康数据 `health_data`。

pub mod alert_channel_source;
pub mod health_event_source;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use pipeline_core::{config::DatabaseConfig, PipelineError, PipelineResult};

pub use alert_channel_source::SqliteAlertChannelSource;
pub use health_event_source::SqliteHealthEventSource;

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS alert_config (
        id INTEGER PRIMARY KEY,
        type TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 0,
        corp_id TEXT,
        appid TEXT,
        cooldown_seconds INTEGER NOT NULL DEFAULT 300
    )"#,
    r#"CREATE TABLE IF NOT EXISTS health_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id TEXT NOT NULL,
        metric_kind TEXT NOT NULL,
        value REAL NOT NULL,
        observed_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_health_data_observed_at ON health_data (observed_at)",
    "CREATE INDEX IF NOT EXISTS idx_health_data_device ON health_data (device_id, observed_at)",
];

/// 创建连接池，按配置建表
pub async fn connect_pool(config: &DatabaseConfig) -> PipelineResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| PipelineError::Configuration(format!("数据库URL无效: {e}")))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    if config.create_schema {
        ensure_schema(&pool).await?;
    }
    info!("数据库连接池已创建: {}", config.url);
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool) -> PipelineResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
