use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use pipeline_core::{AlertChannel, AlertChannelSource, PipelineResult};

pub struct SqliteAlertChannelSource {
    pool: SqlitePool,
}

impl SqliteAlertChannelSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_channel(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<AlertChannel> {
        Ok(AlertChannel {
            id: row.try_get("id")?,
            channel_type: row.try_get("type")?,
            enabled: row.try_get("enabled")?,
            corp_id: row.try_get("corp_id")?,
            app_id: row.try_get("appid")?,
            cooldown_seconds: row.try_get("cooldown_seconds")?,
        })
    }

    pub async fn upsert(&self, channel: &AlertChannel) -> PipelineResult<()> {
        sqlx::query(
            r#"INSERT INTO alert_config (id, type, enabled, corp_id, appid, cooldown_seconds)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   type = excluded.type,
                   enabled = excluded.enabled,
                   corp_id = excluded.corp_id,
                   appid = excluded.appid,
                   cooldown_seconds = excluded.cooldown_seconds"#,
        )
        .bind(channel.id)
        .bind(&channel.channel_type)
        .bind(channel.enabled)
        .bind(&channel.corp_id)
        .bind(&channel.app_id)
        .bind(channel.cooldown_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AlertChannelSource for SqliteAlertChannelSource {
    #[instrument(skip(self))]
    async fn load_channels(&self) -> PipelineResult<Vec<AlertChannel>> {
        let rows = sqlx::query(
            "SELECT id, type, enabled, corp_id, appid, cooldown_seconds FROM alert_config ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let channels = rows
            .iter()
            .map(Self::row_to_channel)
            .collect::<PipelineResult<Vec<_>>>()?;
        debug!("加载了 {} 个告警通道", channels.len());
        Ok(channels)
    }
}
