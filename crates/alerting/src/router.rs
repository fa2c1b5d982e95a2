use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use pipeline_core::{
    AlertChannel, AlertDecision, HealthEvent, Notification, Notifier, StateKeys, StateStore,
};
use pipeline_infrastructure::MetricsRegistry;

use crate::retry::RetryPolicy;
use crate::rules::RuleSet;

/// 单个告警决策的发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: String },
    /// 通道缺少 corp_id / app_id
    Skipped,
}

/// 一条事件的路由结果
#[derive(Debug, Clone, Default)]
pub struct RouteReport {
    pub decisions: Vec<AlertDecision>,
    pub delivered: usize,
    pub failed: usize,
}

pub struct AlertRouter {
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<MetricsRegistry>,
    rules: Arc<RuleSet>,
    keys: StateKeys,
    retry: RetryPolicy,
}

impl AlertRouter {
    pub fn new(
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<MetricsRegistry>,
        rules: Arc<RuleSet>,
        keys: StateKeys,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            metrics,
            rules,
            keys,
            retry,
        }
    }

    /// 按通道顺序产生告警决策，每个通道最多一个
    ///
    /// 冷却标记通过原子的 set-if-absent 写入，写入成功即视为该键没有生效中的冷却。
    /// 状态存储不可用时按“不在冷却中”处理。
    #[instrument(skip(self, event, channels), fields(device_id = %event.device_id, metric = %event.metric_kind))]
    pub async fn evaluate(
        &self,
        event: &HealthEvent,
        channels: &[AlertChannel],
    ) -> Vec<AlertDecision> {
        let mut decisions = Vec::new();

        for channel in channels {
            if !channel.enabled {
                continue;
            }

            let mut candidates = self.rules.matching(channel.id, event).peekable();
            if candidates.peek().is_none() {
                continue;
            }
            if !channel.has_credentials() {
                warn!(
                    channel_id = channel.id,
                    channel_type = %channel.channel_type,
                    "告警通道缺少corp_id或appid配置，跳过"
                );
                continue;
            }

            for rule in candidates {
                let triggered_at = Utc::now();
                if !self
                    .acquire_cooldown(channel, &event.device_id, &rule.name, &triggered_at.to_rfc3339())
                    .await
                {
                    debug!(
                        channel_id = channel.id,
                        reason = %rule.name,
                        "冷却中，抑制告警"
                    );
                    self.metrics.record_alert_suppressed(channel.id);
                    continue;
                }

                self.metrics.record_alert_triggered(channel.id);
                decisions.push(AlertDecision {
                    channel_id: channel.id,
                    device_id: event.device_id.clone(),
                    reason: rule.name.clone(),
                    metric_kind: event.metric_kind,
                    value: event.value,
                    triggered_at,
                });
                break;
            }
        }

        decisions
    }

    async fn acquire_cooldown(
        &self,
        channel: &AlertChannel,
        device_id: &str,
        reason: &str,
        marker: &str,
    ) -> bool {
        if channel.cooldown_seconds <= 0 {
            return true;
        }
        let key = self.keys.cooldown(channel.id, device_id, reason);
        let ttl = Duration::from_secs(channel.cooldown_seconds as u64);

        match self.store.set_if_absent(&key, marker, ttl).await {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!("写入冷却标记失败，按无冷却处理: {}", e);
                self.metrics.record_store_error("set_if_absent");
                true
            }
        }
    }

    /// 发送单个告警决策，失败按策略重试，最终失败只记录不上抛
    #[instrument(skip(self, decision, channel), fields(channel_id = channel.id, device_id = %decision.device_id))]
    pub async fn dispatch(&self, decision: &AlertDecision, channel: &AlertChannel) -> DispatchOutcome {
        let (Some(corp_id), Some(app_id)) = (channel.corp_id.as_ref(), channel.app_id.as_ref())
        else {
            warn!("告警通道 {} 缺少发送凭据，跳过发送", channel.id);
            return DispatchOutcome::Skipped;
        };
        let notification = Notification {
            corp_id: corp_id.clone(),
            app_id: app_id.clone(),
            device_id: decision.device_id.clone(),
            message: decision.message(),
        };

        let mut attempt = 1;
        loop {
            match self.notifier.send(&notification).await {
                Ok(()) => {
                    info!(
                        reason = %decision.reason,
                        attempts = attempt,
                        "告警已发送"
                    );
                    return DispatchOutcome::Delivered { attempts: attempt };
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "告警发送失败 (第{}/{}次): {}，{:?}后重试",
                        attempt, self.retry.max_attempts, e, delay
                    );
                    self.metrics.record_dispatch_retry(channel.id);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "告警发送失败，已达到最大尝试次数 {}，丢弃: {}",
                        attempt, e
                    );
                    self.metrics.record_dispatch_failure(channel.id);
                    return DispatchOutcome::Failed {
                        attempts: attempt,
                        error: e.to_string(),
                    };
                }
            }
        }
    }

    /// 评估并发送，通道之间互不影响
    pub async fn route(&self, event: &HealthEvent, channels: &[AlertChannel]) -> RouteReport {
        let decisions = self.evaluate(event, channels).await;
        let mut report = RouteReport::default();

        for decision in &decisions {
            let Some(channel) = channels.iter().find(|c| c.id == decision.channel_id) else {
                continue;
            };
            match self.dispatch(decision, channel).await {
                DispatchOutcome::Delivered { .. } => report.delivered += 1,
                DispatchOutcome::Failed { .. } => report.failed += 1,
                DispatchOutcome::Skipped => {}
            }
        }

        report.decisions = decisions;
        report
    }
}
