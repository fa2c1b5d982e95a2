use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, instrument};

use pipeline_core::{HealthEvent, HealthEventSource, MetricKind, PipelineResult};

pub struct SqliteHealthEventSource {
    pool: SqlitePool,
}

impl SqliteHealthEventSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<HealthEvent> {
        let metric_kind: String = row.try_get("metric_kind")?;
        Ok(HealthEvent {
            id: row.try_get("id")?,
            device_id: row.try_get("device_id")?,
            metric_kind: MetricKind::parse(&metric_kind),
            value: row.try_get("value")?,
            observed_at: row.try_get("observed_at")?,
        })
    }

    /// 写入一条健康数据，返回自增ID（采集方与测试使用）
    pub async fn insert(
        &self,
        device_id: &str,
        metric_kind: MetricKind,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> PipelineResult<i64> {
        let result = sqlx::query(
            "INSERT INTO health_data (device_id, metric_kind, value, observed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(metric_kind.as_str())
        .bind(value)
        .bind(observed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl HealthEventSource for SqliteHealthEventSource {
    #[instrument(skip(self))]
    async fn fetch_after(&self, after_id: i64, limit: usize) -> PipelineResult<Vec<HealthEvent>> {
        let rows = sqlx::query(
            r#"SELECT id, device_id, metric_kind, value, observed_at
               FROM health_data
               WHERE id > ?
               ORDER BY id ASC
               LIMIT ?"#,
        )
        .bind(after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .iter()
            .map(Self::row_to_event)
            .collect::<PipelineResult<Vec<_>>>()?;
        debug!("读取了 {} 条健康数据 (after_id={})", events.len(), after_id);
        Ok(events)
    }

    #[instrument(skip(self))]
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> PipelineResult<u64> {
        let result = sqlx::query("DELETE FROM health_data WHERE julianday(observed_at) < julianday(?)")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected();
        info!("清理了 {} 条过期健康数据 (cutoff={})", deleted, cutoff);
        Ok(deleted)
    }
}
