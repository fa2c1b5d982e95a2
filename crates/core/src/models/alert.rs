use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::health::{HealthEvent, MetricKind};

/// 告警通道配置
///
/// 对应外部配置表中的一行记录，由配置协作方维护，流水线只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertChannel {
    pub id: i64,
    /// 消息服务提供方类型，例如 `wecom`
    #[serde(rename = "type")]
    pub channel_type: String,
    pub enabled: bool,
    #[serde(default)]
    pub corp_id: Option<String>,
    #[serde(default, alias = "appid")]
    pub app_id: Option<String>,
    pub cooldown_seconds: i64,
}

impl AlertChannel {
    /// corp_id 与 app_id 均已配置（非空）
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.corp_id) && present(&self.app_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Le => value <= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }
}

/// 阈值告警规则，`name` 即告警决策中的原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub metric_kind: MetricKind,
    pub comparator: Comparator,
    pub threshold: f64,
    /// 适用的通道ID，为空表示所有通道
    #[serde(default)]
    pub channels: Vec<i64>,
}

impl AlertRule {
    pub fn applies_to(&self, channel_id: i64) -> bool {
        self.channels.is_empty() || self.channels.contains(&channel_id)
    }

    pub fn matches(&self, event: &HealthEvent) -> bool {
        event.metric_kind != MetricKind::Unknown
            && event.metric_kind == self.metric_kind
            && event.value.is_finite()
            && self.comparator.compare(event.value, self.threshold)
    }
}

/// 告警决策，只以冷却标记的形式持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDecision {
    pub channel_id: i64,
    pub device_id: String,
    pub reason: String,
    pub metric_kind: MetricKind,
    pub value: f64,
    pub triggered_at: DateTime<Utc>,
}

impl AlertDecision {
    pub fn message(&self) -> String {
        format!(
            "设备 {} 触发告警 [{}]: {} = {} ({})",
            self.device_id,
            self.reason,
            self.metric_kind,
            self.value,
            self.triggered_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// 发往外部消息服务的一次通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub corp_id: String,
    #[serde(rename = "appid")]
    pub app_id: String,
    pub device_id: String,
    pub message: String,
}
