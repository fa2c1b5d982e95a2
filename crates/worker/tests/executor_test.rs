use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline_core::{
    config::ExecutorConfig, JobContext, JobDefinition, JobHandler, JobRunStatus, PipelineError,
    PipelineResult, StateKeys, StateStore,
};
use pipeline_infrastructure::observability::metrics_registry::{
    JOBS_IN_FLIGHT, JOBS_RUN_TOTAL, JOB_DURATION_SECONDS, JOB_SUBMISSIONS_SKIPPED_TOTAL,
    STATE_STORE_ERRORS_TOTAL,
};
use pipeline_infrastructure::{InMemoryStateStore, JobRunStore, MetricsRegistry};
use pipeline_worker::{HandlerRegistry, JobExecutor, SubmitOutcome};
use tokio::sync::Notify;

/// 可控的测试处理器
struct ScriptedHandler {
    id: &'static str,
    calls: AtomicU32,
    behavior: Behavior,
    started: Notify,
    release: Notify,
}

enum Behavior {
    Succeed,
    Fail,
    Panic,
    /// 第一次调用一直阻塞，之后成功
    HangOnce,
    /// 阻塞直到 release 被通知
    WaitForRelease,
}

impl ScriptedHandler {
    fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id,
            calls: AtomicU32::new(0),
            behavior,
            started: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    fn name(&self) -> &str {
        self.id
    }

    async fn run(&self, _ctx: &JobContext) -> PipelineResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(PipelineError::HandlerFailure("boom".to_string())),
            Behavior::Panic => panic!("handler exploded"),
            Behavior::HangOnce => {
                if call == 0 {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(())
            }
            Behavior::WaitForRelease => {
                self.release.notified().await;
                Ok(())
            }
        }
    }
}

struct UnavailableStore;

#[async_trait]
impl StateStore for UnavailableStore {
    async fn get(&self, _key: &str) -> PipelineResult<Option<String>> {
        Err(PipelineError::StoreUnavailable("timeout".to_string()))
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> PipelineResult<()> {
        Err(PipelineError::StoreUnavailable("timeout".to_string()))
    }
    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> PipelineResult<bool> {
        Err(PipelineError::StoreUnavailable("timeout".to_string()))
    }
    async fn delete_if_equals(&self, _key: &str, _expected: &str) -> PipelineResult<bool> {
        Err(PipelineError::StoreUnavailable("timeout".to_string()))
    }
    async fn delete(&self, _key: &str) -> PipelineResult<bool> {
        Err(PipelineError::StoreUnavailable("timeout".to_string()))
    }
    async fn ping(&self) -> PipelineResult<()> {
        Err(PipelineError::StoreUnavailable("timeout".to_string()))
    }
    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}

struct Fixture {
    executor: Arc<JobExecutor>,
    store: Arc<dyn StateStore>,
    runs: JobRunStore,
    metrics: Arc<MetricsRegistry>,
}

fn keys() -> StateKeys {
    StateKeys::new("test")
}

fn fixture_with_store(
    handler: Arc<ScriptedHandler>,
    max_duration_seconds: Option<u64>,
    store: Arc<dyn StateStore>,
) -> Fixture {
    let mut registry = HandlerRegistry::new();
    registry.register(handler.clone()).unwrap();

    let mut definition = JobDefinition::new("job", "every 1 minute", handler.id);
    definition.max_duration_seconds = max_duration_seconds;

    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let runs = JobRunStore::new(store.clone(), keys(), Duration::from_secs(86400));
    let executor = JobExecutor::new(
        &[definition],
        &registry,
        &ExecutorConfig::default(),
        store.clone(),
        runs.clone(),
        keys(),
        metrics.clone(),
        "test-host",
    )
    .unwrap();

    Fixture {
        executor: Arc::new(executor),
        store,
        runs,
        metrics,
    }
}

fn fixture(handler: Arc<ScriptedHandler>, max_duration_seconds: Option<u64>) -> Fixture {
    fixture_with_store(
        handler,
        max_duration_seconds,
        Arc::new(InMemoryStateStore::new()),
    )
}

fn completed(outcome: SubmitOutcome) -> pipeline_core::JobRun {
    match outcome {
        SubmitOutcome::Completed(run) => run,
        SubmitOutcome::AlreadyRunning => panic!("expected a completed run"),
    }
}

#[tokio::test]
async fn test_successful_run_is_recorded() {
    let handler = ScriptedHandler::new("ok", Behavior::Succeed);
    let f = fixture(handler.clone(), None);

    let run = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(run.status, JobRunStatus::Succeeded);
    assert_eq!(run.owner, "test-host");
    assert!(run.finished_at.is_some());

    let latest = f.runs.latest("job").await.unwrap().unwrap();
    assert_eq!(latest, run);
    assert!(!f.store.exists(&keys().job_lock("job")).await.unwrap());

    assert_eq!(
        f.metrics
            .sample(JOBS_RUN_TOTAL, &[("job", "job"), ("status", "succeeded")]),
        Some(1.0)
    );
    let duration_count = format!("{JOB_DURATION_SECONDS}_count");
    assert_eq!(f.metrics.sample(&duration_count, &[("job", "job")]), Some(1.0));
    assert_eq!(f.metrics.sample(JOBS_IN_FLIGHT, &[]), Some(0.0));
}

#[tokio::test]
async fn test_concurrent_submission_returns_already_running() {
    let handler = ScriptedHandler::new("slow", Behavior::WaitForRelease);
    let f = fixture(handler.clone(), None);

    let executor = f.executor.clone();
    let first = tokio::spawn(async move { executor.submit("job").await });
    handler.started.notified().await;

    let running = f.runs.latest("job").await.unwrap().unwrap();
    assert_eq!(running.status, JobRunStatus::Running);
    assert_eq!(f.metrics.sample(JOBS_IN_FLIGHT, &[]), Some(1.0));

    let second = f.executor.submit("job").await.unwrap();
    assert_eq!(second, SubmitOutcome::AlreadyRunning);

    handler.release.notify_one();
    let run = completed(first.await.unwrap().unwrap());
    assert_eq!(run.status, JobRunStatus::Succeeded);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        f.metrics
            .sample(JOB_SUBMISSIONS_SKIPPED_TOTAL, &[("job", "job")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_lock_held_by_another_owner_is_respected() {
    let handler = ScriptedHandler::new("ok", Behavior::Succeed);
    let f = fixture(handler.clone(), None);
    f.store
        .set(&keys().job_lock("job"), "other-run", Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(
        f.executor.submit("job").await.unwrap(),
        SubmitOutcome::AlreadyRunning
    );
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        f.store.get(&keys().job_lock("job")).await.unwrap().as_deref(),
        Some("other-run")
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_marks_failed_and_releases_lock() {
    let handler = ScriptedHandler::new("hang", Behavior::HangOnce);
    let f = fixture(handler.clone(), Some(5));

    let run = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(run.status, JobRunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("timeout"));
    assert!(run.is_timeout());
    assert!(!f.store.exists(&keys().job_lock("job")).await.unwrap());

    let next = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(next.status, JobRunStatus::Succeeded);
    assert_ne!(next.run_id, run.run_id);

    assert_eq!(
        f.metrics
            .sample(JOBS_RUN_TOTAL, &[("job", "job"), ("status", "failed")]),
        Some(1.0)
    );
    assert_eq!(
        f.metrics
            .sample(JOBS_RUN_TOTAL, &[("job", "job"), ("status", "succeeded")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_handler_error_is_contained() {
    let handler = ScriptedHandler::new("fail", Behavior::Fail);
    let f = fixture(handler.clone(), None);

    let run = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(run.status, JobRunStatus::Failed);
    assert!(run.error.as_deref().unwrap().contains("boom"));
    assert!(!f.store.exists(&keys().job_lock("job")).await.unwrap());

    // 失败后可以再次运行
    let again = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(again.status, JobRunStatus::Failed);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_handler_panic_is_contained() {
    let handler = ScriptedHandler::new("panic", Behavior::Panic);
    let f = fixture(handler.clone(), None);

    let run = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(run.status, JobRunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("handler panicked"));
    assert!(!f.store.exists(&keys().job_lock("job")).await.unwrap());
    assert_eq!(f.metrics.sample(JOBS_IN_FLIGHT, &[]), Some(0.0));
}

#[tokio::test]
async fn test_unavailable_store_still_runs_job() {
    let handler = ScriptedHandler::new("ok", Behavior::Succeed);
    let f = fixture_with_store(handler.clone(), None, Arc::new(UnavailableStore));

    let run = completed(f.executor.submit("job").await.unwrap());
    assert_eq!(run.status, JobRunStatus::Succeeded);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        f.metrics
            .sample(STATE_STORE_ERRORS_TOTAL, &[("operation", "set_if_absent")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_unknown_job_name() {
    let handler = ScriptedHandler::new("ok", Behavior::Succeed);
    let f = fixture(handler, None);
    let err = f.executor.submit("missing").await.unwrap_err();
    assert!(matches!(err, PipelineError::JobNotFound { .. }));
}

#[test]
fn test_unknown_handler_fails_construction() {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let result = JobExecutor::new(
        &[JobDefinition::new("job", "every 1 minute", "does_not_exist")],
        &HandlerRegistry::new(),
        &ExecutorConfig::default(),
        store.clone(),
        JobRunStore::new(store, keys(), Duration::from_secs(60)),
        keys(),
        Arc::new(MetricsRegistry::new().unwrap()),
        "test-host",
    );
    let err = result.err().unwrap();
    assert!(matches!(err, PipelineError::UnknownHandler { ref handler } if handler == "does_not_exist"));
    assert!(err.is_config_error());
}
