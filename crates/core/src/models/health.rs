use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 采集到的健康指标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    BloodOxygen,
    BodyTemperature,
    SystolicPressure,
    DiastolicPressure,
    StepCount,
    BatteryLevel,
    /// 无法识别的指标，不会匹配任何告警规则
    #[serde(other)]
    Unknown,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::BloodOxygen => "blood_oxygen",
            MetricKind::BodyTemperature => "body_temperature",
            MetricKind::SystolicPressure => "systolic_pressure",
            MetricKind::DiastolicPressure => "diastolic_pressure",
            MetricKind::StepCount => "step_count",
            MetricKind::BatteryLevel => "battery_level",
            MetricKind::Unknown => "unknown",
        }
    }

    /// 从数据库中的字符串列解析，未知值映射为 Unknown
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "heart_rate" => MetricKind::HeartRate,
            "blood_oxygen" => MetricKind::BloodOxygen,
            "body_temperature" => MetricKind::BodyTemperature,
            "systolic_pressure" => MetricKind::SystolicPressure,
            "diastolic_pressure" => MetricKind::DiastolicPressure,
            "step_count" => MetricKind::StepCount,
            "battery_level" => MetricKind::BatteryLevel,
            _ => MetricKind::Unknown,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条采集到的健康数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    /// 采集表中的自增ID，用作处理水位
    pub id: i64,
    pub device_id: String,
    pub metric_kind: MetricKind,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}
