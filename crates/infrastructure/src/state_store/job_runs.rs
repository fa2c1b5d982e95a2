use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{JobRun, PipelineResult, StateKeys, StateStore};

/// 任务运行记录读写
///
/// 运行记录只是可观测性数据，写入时带保留期，过期后由存储自动清除。
#[derive(Clone)]
pub struct JobRunStore {
    store: Arc<dyn StateStore>,
    keys: StateKeys,
    retention: Duration,
}

impl JobRunStore {
    pub fn new(store: Arc<dyn StateStore>, keys: StateKeys, retention: Duration) -> Self {
        Self {
            store,
            keys,
            retention,
        }
    }

    pub async fn save(&self, run: &JobRun) -> PipelineResult<()> {
        let payload = serde_json::to_string(run)?;
        self.store
            .set(
                &self.keys.job_run(&run.job_name, &run.run_id),
                &payload,
                self.retention,
            )
            .await?;
        self.store
            .set(
                &self.keys.latest_run(&run.job_name),
                &run.run_id,
                self.retention,
            )
            .await
    }

    pub async fn load(&self, job_name: &str, run_id: &str) -> PipelineResult<Option<JobRun>> {
        match self.store.get(&self.keys.job_run(job_name, run_id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn latest(&self, job_name: &str) -> PipelineResult<Option<JobRun>> {
        match self.store.get(&self.keys.latest_run(job_name)).await? {
            Some(run_id) => self.load(job_name, &run_id).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;
    use pipeline_core::JobRunStatus;

    fn run_store(retention_secs: u64) -> JobRunStore {
        JobRunStore::new(
            Arc::new(InMemoryStateStore::new()),
            StateKeys::new("test"),
            Duration::from_secs(retention_secs),
        )
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let runs = run_store(3600);
        let mut first = JobRun::pending("cleanup-stale-data", "host-a");
        first.start();
        first.succeed();
        runs.save(&first).await.unwrap();

        let mut second = JobRun::pending("cleanup-stale-data", "host-a");
        second.start();
        runs.save(&second).await.unwrap();

        let latest = runs.latest("cleanup-stale-data").await.unwrap().unwrap();
        assert_eq!(latest.run_id, second.run_id);
        assert_eq!(latest.status, JobRunStatus::Running);

        let loaded = runs
            .load("cleanup-stale-data", &first.run_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, JobRunStatus::Succeeded);
        assert!(runs.latest("other-job").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_expire_after_retention() {
        let runs = run_store(60);
        let run = JobRun::pending("process-health-data", "host-a");
        runs.save(&run).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(runs.latest("process-health-data").await.unwrap().is_none());
    }
}
