use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use pipeline_alerting::{AlertRouter, ChannelSnapshot};
use pipeline_core::{
    config::{ProcessingConfig, PROCESS_HEALTH_DATA_HANDLER},
    HealthEventSource, JobContext, JobHandler, PipelineError, PipelineResult, StateKeys,
    StateStore,
};

const WATERMARK_STREAM: &str = "health_data";
const WATERMARK_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// 一次处理的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub batches: usize,
    pub events: usize,
    pub decisions: usize,
    pub delivered: usize,
    pub failed: usize,
    pub watermark: i64,
}

/// 批量读取新的健康数据并路由告警
///
/// 以水位线（已处理的最大事件ID）为起点，每批处理完后推进水位线。
/// 同一次运行的所有事件使用运行开始时的通道快照。
pub struct ProcessHealthDataJob {
    source: Arc<dyn HealthEventSource>,
    router: Arc<AlertRouter>,
    channels: Arc<ChannelSnapshot>,
    store: Arc<dyn StateStore>,
    keys: StateKeys,
    batch_size: usize,
    max_batches: usize,
}

impl ProcessHealthDataJob {
    pub fn new(
        source: Arc<dyn HealthEventSource>,
        router: Arc<AlertRouter>,
        channels: Arc<ChannelSnapshot>,
        store: Arc<dyn StateStore>,
        keys: StateKeys,
        config: &ProcessingConfig,
    ) -> Self {
        Self {
            source,
            router,
            channels,
            store,
            keys,
            batch_size: config.batch_size.max(1),
            max_batches: config.max_batches_per_run.max(1),
        }
    }

    pub async fn process(&self) -> PipelineResult<ProcessSummary> {
        let channels = self.channels.current().await;
        let mut summary = ProcessSummary {
            watermark: self.load_watermark().await?,
            ..ProcessSummary::default()
        };

        let mut drained = false;
        while summary.batches < self.max_batches {
            let events = self
                .source
                .fetch_after(summary.watermark, self.batch_size)
                .await?;
            let Some(last) = events.last() else {
                drained = true;
                break;
            };
            let next_watermark = last.id;

            for event in &events {
                let report = self.router.route(event, &channels).await;
                summary.decisions += report.decisions.len();
                summary.delivered += report.delivered;
                summary.failed += report.failed;
            }

            summary.batches += 1;
            summary.events += events.len();
            summary.watermark = next_watermark;
            self.save_watermark(next_watermark).await?;
            debug!(
                batch = summary.batches,
                size = events.len(),
                watermark = next_watermark,
                "批次处理完成"
            );

            if events.len() < self.batch_size {
                drained = true;
                break;
            }
        }

        if !drained {
            warn!(
                "本次运行已达到最大批次数 {}，剩余数据留到下次处理",
                self.max_batches
            );
        }
        Ok(summary)
    }

    async fn load_watermark(&self) -> PipelineResult<i64> {
        match self.store.get(&self.keys.watermark(WATERMARK_STREAM)).await? {
            Some(value) => value.parse().map_err(|_| {
                PipelineError::Internal(format!("水位线格式无效: {value}"))
            }),
            None => Ok(0),
        }
    }

    async fn save_watermark(&self, watermark: i64) -> PipelineResult<()> {
        self.store
            .set(
                &self.keys.watermark(WATERMARK_STREAM),
                &watermark.to_string(),
                WATERMARK_TTL,
            )
            .await
    }
}

#[async_trait]
impl JobHandler for ProcessHealthDataJob {
    fn name(&self) -> &str {
        PROCESS_HEALTH_DATA_HANDLER
    }

    async fn run(&self, ctx: &JobContext) -> PipelineResult<()> {
        let summary = self.process().await?;
        info!(
            run_id = %ctx.run_id,
            events = summary.events,
            decisions = summary.decisions,
            delivered = summary.delivered,
            failed = summary.failed,
            watermark = summary.watermark,
            "健康数据处理完成"
        );
        Ok(())
    }

    fn description(&self) -> &str {
        "批量处理新的健康数据并分发告警"
    }
}
