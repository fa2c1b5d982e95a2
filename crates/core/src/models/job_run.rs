use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 超时运行写入的错误原因
pub const TIMEOUT_REASON: &str = "timeout";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRun {
    pub job_name: String,
    pub run_id: String,
    /// 持有单飞锁的进程标识
    pub owner: String,
    pub status: JobRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobRunStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
}

impl JobRunStatus {
    /// 指标标签使用的小写名称
    pub fn as_label(&self) -> &'static str {
        match self {
            JobRunStatus::Pending => "pending",
            JobRunStatus::Running => "running",
            JobRunStatus::Succeeded => "succeeded",
            JobRunStatus::Failed => "failed",
        }
    }
}

impl JobRun {
    pub fn pending(job_name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            run_id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            status: JobRunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobRunStatus::Running;
        self.started_at = Utc::now();
    }

    pub fn succeed(&mut self) {
        self.finish(JobRunStatus::Succeeded, None);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish(JobRunStatus::Failed, Some(error.into()));
    }

    fn finish(&mut self, status: JobRunStatus, error: Option<String>) {
        // 终态不可再变更
        if self.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_running(&self) -> bool {
        self.status == JobRunStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobRunStatus::Succeeded | JobRunStatus::Failed)
    }

    pub fn is_timeout(&self) -> bool {
        self.status == JobRunStatus::Failed && self.error.as_deref() == Some(TIMEOUT_REASON)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}
