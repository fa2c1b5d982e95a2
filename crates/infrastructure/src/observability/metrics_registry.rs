//! Metrics registry for the health pipeline
//!
//! Series are registered on an owned Prometheus recorder instead of the global
//! `metrics` recorder, so every component receives the registry explicitly and
//! tests can create isolated instances.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tracing::debug;

use pipeline_core::{PipelineError, PipelineResult};

pub const JOBS_RUN_TOTAL: &str = "jobs_run_total";
pub const JOB_DURATION_SECONDS: &str = "job_duration_seconds";
pub const JOBS_IN_FLIGHT: &str = "jobs_in_flight";
pub const JOB_QUEUE_DEPTH: &str = "job_queue_depth";
pub const JOB_SUBMISSIONS_SKIPPED_TOTAL: &str = "job_submissions_skipped_total";
pub const ALERTS_TRIGGERED_TOTAL: &str = "alerts_triggered_total";
pub const ALERTS_SUPPRESSED_TOTAL: &str = "alerts_suppressed_total";
pub const ALERT_DISPATCH_FAILURES_TOTAL: &str = "alert_dispatch_failures_total";
pub const ALERT_DISPATCH_RETRIES_TOTAL: &str = "alert_dispatch_retries_total";
pub const STATE_STORE_ERRORS_TOTAL: &str = "state_store_errors_total";

const JOB_DURATION_BUCKETS: [f64; 11] = [
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Metrics registry for the health pipeline
///
/// Registration is idempotent: the recorder hands back the same underlying
/// atomic for an identical name/label set, so handlers built per run can call
/// the record methods freely.
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    jobs_in_flight: Gauge,
    job_queue_depth: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> PipelineResult<Self> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(JOB_DURATION_SECONDS.to_string()),
                &JOB_DURATION_BUCKETS,
            )
            .map_err(|e| PipelineError::Configuration(format!("invalid histogram buckets: {e}")))?
            .build_recorder();
        let handle = recorder.handle();

        let registry = Self {
            jobs_in_flight: recorder.register_gauge(&Key::from_name(JOBS_IN_FLIGHT), &METADATA),
            job_queue_depth: recorder.register_gauge(&Key::from_name(JOB_QUEUE_DEPTH), &METADATA),
            recorder,
            handle,
        };
        registry.describe();
        Ok(registry)
    }

    fn describe(&self) {
        let counters = [
            (JOBS_RUN_TOTAL, "Finished job runs by job and terminal status"),
            (JOB_SUBMISSIONS_SKIPPED_TOTAL, "Job firings skipped because the job was already running or the queue was full"),
            (ALERTS_TRIGGERED_TOTAL, "Alert decisions emitted per channel"),
            (ALERTS_SUPPRESSED_TOTAL, "Matching events suppressed by a live cooldown marker"),
            (ALERT_DISPATCH_FAILURES_TOTAL, "Alert notifications dropped after exhausting retries"),
            (ALERT_DISPATCH_RETRIES_TOTAL, "Alert notification retry attempts"),
            (STATE_STORE_ERRORS_TOTAL, "State store operations that failed or timed out"),
        ];
        for (name, help) in counters {
            self.recorder
                .describe_counter(KeyName::from(name), Some(Unit::Count), help.into());
        }
        self.recorder.describe_histogram(
            KeyName::from(JOB_DURATION_SECONDS),
            Some(Unit::Seconds),
            "Job run wall-clock duration".into(),
        );
        self.recorder.describe_gauge(
            KeyName::from(JOBS_IN_FLIGHT),
            Some(Unit::Count),
            "Job runs currently executing in this process".into(),
        );
        self.recorder.describe_gauge(
            KeyName::from(JOB_QUEUE_DEPTH),
            Some(Unit::Count),
            "Job names waiting in the local job queue".into(),
        );
    }

    fn counter(&self, name: &'static str, labels: Vec<Label>) -> Counter {
        self.recorder
            .register_counter(&Key::from_parts(name, labels), &METADATA)
    }

    fn histogram(&self, name: &'static str, labels: Vec<Label>) -> Histogram {
        self.recorder
            .register_histogram(&Key::from_parts(name, labels), &METADATA)
    }

    // Job metrics

    /// Record a finished job run
    pub fn record_job_run(&self, job: &str, status: &str, duration_seconds: f64) {
        self.counter(
            JOBS_RUN_TOTAL,
            vec![
                Label::new("job", job.to_string()),
                Label::new("status", status.to_string()),
            ],
        )
        .increment(1);
        self.histogram(JOB_DURATION_SECONDS, vec![Label::new("job", job.to_string())])
            .record(duration_seconds);

        debug!(
            job = job,
            status = status,
            duration_seconds = duration_seconds,
            "Job run recorded"
        );
    }

    pub fn record_submission_skipped(&self, job: &str) {
        self.counter(
            JOB_SUBMISSIONS_SKIPPED_TOTAL,
            vec![Label::new("job", job.to_string())],
        )
        .increment(1);
    }

    pub fn job_started(&self) {
        self.jobs_in_flight.increment(1.0);
    }

    pub fn job_finished(&self) {
        self.jobs_in_flight.decrement(1.0);
    }

    pub fn job_enqueued(&self) {
        self.job_queue_depth.increment(1.0);
    }

    pub fn job_dequeued(&self) {
        self.job_queue_depth.decrement(1.0);
    }

    // Alert metrics

    pub fn record_alert_triggered(&self, channel_id: i64) {
        self.counter(ALERTS_TRIGGERED_TOTAL, channel_label(channel_id))
            .increment(1);
    }

    pub fn record_alert_suppressed(&self, channel_id: i64) {
        self.counter(ALERTS_SUPPRESSED_TOTAL, channel_label(channel_id))
            .increment(1);
    }

    pub fn record_dispatch_retry(&self, channel_id: i64) {
        self.counter(ALERT_DISPATCH_RETRIES_TOTAL, channel_label(channel_id))
            .increment(1);
    }

    pub fn record_dispatch_failure(&self, channel_id: i64) {
        self.counter(ALERT_DISPATCH_FAILURES_TOTAL, channel_label(channel_id))
            .increment(1);
    }

    // State store metrics

    pub fn record_store_error(&self, operation: &str) {
        self.counter(
            STATE_STORE_ERRORS_TOTAL,
            vec![Label::new("operation", operation.to_string())],
        )
        .increment(1);
    }

    /// Render the current snapshot in the Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Current value of one exported sample, `None` if the series was never recorded
    pub fn sample(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let rendered = self.render();
        rendered
            .lines()
            .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
            .find_map(|line| {
                let (series, value) = line.rsplit_once(' ')?;
                let (series_name, series_labels) = parse_series(series);
                if series_name != name || series_labels.len() != labels.len() {
                    return None;
                }
                let all_match = labels.iter().all(|(k, v)| {
                    series_labels
                        .iter()
                        .any(|(sk, sv)| sk == k && sv == v)
                });
                if all_match {
                    value.parse::<f64>().ok()
                } else {
                    None
                }
            })
    }
}

fn channel_label(channel_id: i64) -> Vec<Label> {
    vec![Label::new("channel", channel_id.to_string())]
}

fn parse_series(series: &str) -> (&str, Vec<(String, String)>) {
    match series.split_once('{') {
        Some((name, rest)) => {
            let body = rest.trim_end_matches('}');
            let labels = body
                .split(',')
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    Some((k.trim().to_string(), v.trim().trim_matches('"').to_string()))
                })
                .collect();
            (name, labels)
        }
        None => (series, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render_with_labels() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_job_run("cleanup-stale-data", "succeeded", 0.2);
        metrics.record_job_run("cleanup-stale-data", "succeeded", 0.4);
        metrics.record_job_run("cleanup-stale-data", "failed", 1.5);

        assert_eq!(
            metrics.sample(
                JOBS_RUN_TOTAL,
                &[("job", "cleanup-stale-data"), ("status", "succeeded")]
            ),
            Some(2.0)
        );
        assert_eq!(
            metrics.sample(
                JOBS_RUN_TOTAL,
                &[("job", "cleanup-stale-data"), ("status", "failed")]
            ),
            Some(1.0)
        );

        let rendered = metrics.render();
        assert!(rendered.contains("# TYPE jobs_run_total counter"));
        assert!(rendered.contains("job_duration_seconds_bucket"));
    }

    #[test]
    fn test_repeated_registration_shares_series() {
        let metrics = MetricsRegistry::new().unwrap();
        for _ in 0..5 {
            metrics.record_alert_triggered(7);
        }
        assert_eq!(
            metrics.sample(ALERTS_TRIGGERED_TOTAL, &[("channel", "7")]),
            Some(5.0)
        );
        assert_eq!(metrics.sample(ALERTS_TRIGGERED_TOTAL, &[("channel", "8")]), None);
    }

    #[test]
    fn test_gauges_track_in_flight_and_queue() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished();
        metrics.job_enqueued();

        assert_eq!(metrics.sample(JOBS_IN_FLIGHT, &[]), Some(1.0));
        assert_eq!(metrics.sample(JOB_QUEUE_DEPTH, &[]), Some(1.0));
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.record_store_error("set_if_absent");
        assert_eq!(
            a.sample(STATE_STORE_ERRORS_TOTAL, &[("operation", "set_if_absent")]),
            Some(1.0)
        );
        assert_eq!(
            b.sample(STATE_STORE_ERRORS_TOTAL, &[("operation", "set_if_absent")]),
            None
        );
    }

    #[test]
    fn test_concurrent_writes_are_not_lost() {
        let metrics = std::sync::Arc::new(MetricsRegistry::new().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.record_dispatch_retry(1);
                        let _ = metrics.render();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(
            metrics.sample(ALERT_DISPATCH_RETRIES_TOTAL, &[("channel", "1")]),
            Some(1000.0)
        );
    }
}
