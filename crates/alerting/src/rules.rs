use pipeline_core::{AlertRule, HealthEvent};

/// 告警规则集合，注册后不可变
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<AlertRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 对指定通道命中该事件的规则，保持配置顺序
    pub fn matching<'a>(
        &'a self,
        channel_id: i64,
        event: &'a HealthEvent,
    ) -> impl Iterator<Item = &'a AlertRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.applies_to(channel_id) && rule.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pipeline_core::{Comparator, MetricKind};

    fn rule(name: &str, kind: MetricKind, comparator: Comparator, threshold: f64, channels: Vec<i64>) -> AlertRule {
        AlertRule {
            name: name.to_string(),
            metric_kind: kind,
            comparator,
            threshold,
            channels,
        }
    }

    #[test]
    fn test_matching_preserves_order_and_scope() {
        let rules = RuleSet::new(vec![
            rule("hr_critical", MetricKind::HeartRate, Comparator::Gt, 150.0, vec![1]),
            rule("hr_high", MetricKind::HeartRate, Comparator::Gt, 120.0, vec![]),
            rule("spo2_low", MetricKind::BloodOxygen, Comparator::Lt, 90.0, vec![]),
        ]);
        let event = HealthEvent {
            id: 1,
            device_id: "watch-01".to_string(),
            metric_kind: MetricKind::HeartRate,
            value: 160.0,
            observed_at: Utc::now(),
        };

        let names: Vec<&str> = rules.matching(1, &event).map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["hr_critical", "hr_high"]);

        let names: Vec<&str> = rules.matching(2, &event).map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["hr_high"]);
    }
}
