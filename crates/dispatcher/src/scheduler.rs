use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use pipeline_core::{config::SchedulerConfig, JobDefinition, PipelineError, PipelineResult};

use crate::cadence::{Cadence, CadenceKind};

/// 定时循环与 API 共享的调度器
pub type SharedScheduler = Arc<RwLock<JobScheduler>>;

/// 已注册任务的只读视图
#[derive(Debug, Clone)]
pub struct ScheduledJobInfo {
    pub definition: JobDefinition,
    pub last_fired: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct FireState {
    last_fired: Option<DateTime<Utc>>,
    /// 日历任务已消费到的时间点，不晚于它的触发点都不会再触发
    cursor: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct ScheduledJob {
    definition: JobDefinition,
    cadence: Cadence,
    state: FireState,
}

/// 任务调度器
///
/// `tick(now)` 只依赖传入的当前时间和已记录的触发历史，不做任何入队操作。
/// 固定间隔任务不补触发；日历任务每个触发点最多触发一次，
/// 超过 misfire grace 的触发点（例如进程停机期间错过的）直接跳过。
#[derive(Debug, Clone)]
pub struct JobScheduler {
    jobs: Vec<ScheduledJob>,
    misfire_grace: Duration,
}

impl JobScheduler {
    pub fn new(misfire_grace: StdDuration) -> Self {
        Self {
            jobs: Vec::new(),
            misfire_grace: Duration::from_std(misfire_grace).unwrap_or(Duration::seconds(60)),
        }
    }

    /// 按配置创建调度器并注册全部任务
    pub fn from_config(config: &SchedulerConfig) -> PipelineResult<Self> {
        let mut scheduler = Self::new(StdDuration::from_secs(config.misfire_grace_seconds));
        for job in &config.jobs {
            scheduler.register(job.clone())?;
        }
        Ok(scheduler)
    }

    pub fn into_shared(self) -> SharedScheduler {
        Arc::new(RwLock::new(self))
    }

    /// 注册任务，名称重复或调度表达式无效时返回配置错误
    pub fn register(&mut self, definition: JobDefinition) -> PipelineResult<()> {
        if self.find(&definition.name).is_some() {
            return Err(PipelineError::DuplicateJob {
                name: definition.name,
            });
        }
        let cadence = Cadence::parse(&definition.cadence)?;

        info!(
            job = %definition.name,
            cadence = %cadence,
            handler = %definition.handler,
            "注册定时任务"
        );
        self.jobs.push(ScheduledJob {
            definition,
            cadence,
            state: FireState::default(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn definition(&self, name: &str) -> Option<&JobDefinition> {
        self.find(name).map(|job| &job.definition)
    }

    pub fn last_fired(&self, name: &str) -> Option<DateTime<Utc>> {
        self.find(name).and_then(|job| job.state.last_fired)
    }

    /// 按注册顺序列出任务及其下次触发时间
    pub fn jobs(&self, now: DateTime<Utc>) -> Vec<ScheduledJobInfo> {
        self.jobs
            .iter()
            .map(|job| ScheduledJobInfo {
                definition: job.definition.clone(),
                last_fired: job.state.last_fired,
                next_fire_time: self.next_fire_for(job, now),
            })
            .collect()
    }

    pub fn next_fire_time(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> PipelineResult<Option<DateTime<Utc>>> {
        let job = self.find(name).ok_or_else(|| PipelineError::JobNotFound {
            name: name.to_string(),
        })?;
        Ok(self.next_fire_for(job, now))
    }

    /// 用持久化的触发记录恢复历史，避免重启后固定间隔任务提前触发
    pub fn restore_last_fired(&mut self, name: &str, at: DateTime<Utc>) -> PipelineResult<()> {
        let job = self
            .jobs
            .iter_mut()
            .find(|job| job.definition.name == name)
            .ok_or_else(|| PipelineError::JobNotFound {
                name: name.to_string(),
            })?;

        job.state.last_fired = Some(at);
        if !job.cadence.is_interval() {
            job.state.cursor = Some(job.state.cursor.map_or(at, |cursor| cursor.max(at)));
        }
        debug!(job = name, last_fired = %at, "恢复任务触发记录");
        Ok(())
    }

    /// 计算 `now` 时刻到期的任务，不修改任何状态
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| self.is_due(job, now))
            .map(|job| job.definition.name.clone())
            .collect()
    }

    /// 计算到期任务并记录本次触发
    ///
    /// 日历任务在 `now` 之前的触发点无论是否触发都会被消费。
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut fired = Vec::new();
        let grace = self.misfire_grace;

        for job in &mut self.jobs {
            let due = is_due(&job.cadence, &job.state, grace, now);

            if let CadenceKind::Calendar(_) = job.cadence.kind() {
                if let Some(cursor) = job.state.cursor {
                    if let Some(missed) = job.cadence.next_after(cursor) {
                        if missed <= now - grace {
                            warn!(
                                job = %job.definition.name,
                                missed = %missed,
                                "跳过错过的触发点"
                            );
                        }
                    }
                }
                if job.state.cursor.map_or(true, |cursor| cursor < now) {
                    job.state.cursor = Some(now);
                }
            }

            if due {
                job.state.last_fired = Some(now);
                fired.push(job.definition.name.clone());
            }
        }

        if !fired.is_empty() {
            debug!(jobs = ?fired, "到期任务");
        }
        fired
    }

    fn find(&self, name: &str) -> Option<&ScheduledJob> {
        self.jobs.iter().find(|job| job.definition.name == name)
    }

    fn is_due(&self, job: &ScheduledJob, now: DateTime<Utc>) -> bool {
        is_due(&job.cadence, &job.state, self.misfire_grace, now)
    }

    fn next_fire_for(&self, job: &ScheduledJob, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match job.cadence.kind() {
            CadenceKind::Interval(every) => Some(
                job.state
                    .last_fired
                    .map_or(now, |last| (last + *every).max(now)),
            ),
            CadenceKind::Calendar(_) => job.cadence.next_after(now),
        }
    }
}

fn is_due(cadence: &Cadence, state: &FireState, grace: Duration, now: DateTime<Utc>) -> bool {
    match cadence.kind() {
        CadenceKind::Interval(every) => state
            .last_fired
            .map_or(true, |last| now.signed_duration_since(last) >= *every),
        CadenceKind::Calendar(_) => {
            // 只看 misfire grace 窗口内尚未消费的触发点
            let window_start = now - grace;
            let after = state
                .cursor
                .map_or(window_start, |cursor| cursor.max(window_start));
            cadence.last_occurrence_between(after, now).is_some()
        }
    }
}
