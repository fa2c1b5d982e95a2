use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

use pipeline_core::{PipelineError, PipelineResult};

/// 任务的调度节奏
#[derive(Debug, Clone)]
pub struct Cadence {
    expression: String,
    kind: CadenceKind,
}

#[derive(Debug, Clone)]
pub enum CadenceKind {
    /// 固定间隔，从上次触发开始计时
    Interval(Duration),
    /// 日历触发点（CRON）
    Calendar(Schedule),
}

impl Cadence {
    /// 解析调度表达式
    ///
    /// 支持 `every 10 minutes` 形式的固定间隔，以及 CRON 表达式：
    /// 6/7 段（含秒）、5 段经典格式（自动补 0 秒）和 `@daily` 等简写。
    pub fn parse(expression: &str) -> PipelineResult<Self> {
        let trimmed = expression.trim();
        let invalid = |message: String| PipelineError::InvalidCadence {
            expr: expression.to_string(),
            message,
        };

        if trimmed.is_empty() {
            return Err(invalid("表达式为空".to_string()));
        }

        let kind = if trimmed
            .split_whitespace()
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("every"))
        {
            CadenceKind::Interval(parse_interval(trimmed).map_err(invalid)?)
        } else {
            CadenceKind::Calendar(parse_calendar(trimmed).map_err(invalid)?)
        };

        Ok(Self {
            expression: trimmed.to_string(),
            kind,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn kind(&self) -> &CadenceKind {
        &self.kind
    }

    pub fn is_interval(&self) -> bool {
        matches!(self.kind, CadenceKind::Interval(_))
    }

    /// 严格晚于 `from` 的下一个日历触发点，固定间隔返回 `from + interval`
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            CadenceKind::Interval(every) => Some(from + *every),
            CadenceKind::Calendar(schedule) => schedule.after(&from).next(),
        }
    }

    /// `(after, until]` 区间内最后一个日历触发点
    pub fn last_occurrence_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match &self.kind {
            CadenceKind::Interval(_) => None,
            CadenceKind::Calendar(schedule) => schedule
                .after(&after)
                .take_while(|occurrence| *occurrence <= until)
                .last(),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for Cadence {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_interval(expression: &str) -> Result<Duration, String> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    let [_, amount, unit] = parts.as_slice() else {
        return Err("固定间隔格式应为 `every N seconds|minutes|hours`".to_string());
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("间隔数值无效: {amount}"))?;
    if amount <= 0 {
        return Err("间隔必须大于0".to_string());
    }

    let interval = match unit.to_ascii_lowercase().as_str() {
        "second" | "seconds" => Duration::try_seconds(amount),
        "minute" | "minutes" => Duration::try_minutes(amount),
        "hour" | "hours" => Duration::try_hours(amount),
        other => return Err(format!("不支持的时间单位: {other}")),
    };
    interval.ok_or_else(|| "间隔过大".to_string())
}

fn parse_calendar(expression: &str) -> Result<Schedule, String> {
    let normalized = if expression.starts_with('@') {
        expression.to_string()
    } else {
        match expression.split_whitespace().count() {
            5 => format!("0 {expression}"),
            6 | 7 => expression.to_string(),
            n => return Err(format!("CRON表达式字段数应为5、6或7，实际为{n}")),
        }
    };

    Schedule::from_str(&normalized).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interval_units() {
        let cadence = Cadence::parse("every 10 minutes").unwrap();
        assert!(matches!(cadence.kind(), CadenceKind::Interval(d) if *d == Duration::minutes(10)));

        let cadence = Cadence::parse("every 1 hour").unwrap();
        assert!(matches!(cadence.kind(), CadenceKind::Interval(d) if *d == Duration::hours(1)));

        let cadence = Cadence::parse("Every 30 Seconds").unwrap();
        assert!(cadence.is_interval());
    }

    #[test]
    fn test_five_field_cron_gets_seconds() {
        let cadence = Cadence::parse("30 2 * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            cadence.next_after(from),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 2, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_last_occurrence_between() {
        let cadence = Cadence::parse("0 0 * * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(
            cadence.last_occurrence_between(after, until),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );
        // 左开区间
        assert_eq!(cadence.last_occurrence_between(after, after), None);
    }
}
