// Job Scheduler - central scheduler for all background jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler as TokioScheduler, JobSchedulerError};
use tracing::{error, info};
use uuid::Uuid;

use crate::orchestrator::Orchestrator;

const EXECUTION_POLLER: &str = "execution_poller";
const CONTAINER_SWEEP: &str = "container_sweep";

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// How often due scheduled executions are claimed (seconds)
    pub execution_poll_interval_secs: u32,
    /// How often stuck containers are swept (minutes)
    pub container_sweep_interval_minutes: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            execution_poll_interval_secs: 30,
            container_sweep_interval_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionLog {
    pub id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub items_processed: i64,
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

pub struct JobScheduler {
    scheduler: TokioScheduler,
    orchestrator: Arc<Orchestrator>,
    config: JobConfig,
    execution_logs: Arc<RwLock<Vec<JobExecutionLog>>>,
}

impl JobScheduler {
    pub async fn new(orchestrator: Arc<Orchestrator>, config: JobConfig) -> JobResult<Self> {
        let scheduler = TokioScheduler::new().await?;

        Ok(Self {
            scheduler,
            orchestrator,
            config,
            execution_logs: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        info!("Starting background job scheduler");

        self.schedule_execution_poller().await?;
        self.schedule_container_sweep().await?;
        self.scheduler.start().await?;

        info!("Background job scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> JobResult<()> {
        info!("Shutting down background job scheduler");
        self.scheduler.shutdown().await?;
        Ok(())
    }

    /// Most recent execution logs, newest last. Capped at 100 entries.
    pub async fn recent_logs(&self) -> Vec<JobExecutionLog> {
        self.execution_logs.read().await.clone()
    }

    /// Run one job immediately, outside its schedule.
    pub async fn run_job_now(&self, job_name: &str) -> JobResult<JobExecutionLog> {
        let log = match job_name {
            EXECUTION_POLLER => run_execution_poller(&self.orchestrator).await,
            CONTAINER_SWEEP => run_container_sweep(&self.orchestrator).await,
            other => return Err(JobError::UnknownJob(other.to_string())),
        };
        push_log(&self.execution_logs, log.clone()).await;
        Ok(log)
    }

    async fn schedule_execution_poller(&self) -> JobResult<()> {
        let interval = self.config.execution_poll_interval_secs;
        let cron_expr = format!("*/{} * * * * *", interval); // Every N seconds

        let orchestrator = self.orchestrator.clone();
        let logs = self.execution_logs.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let orchestrator = orchestrator.clone();
            let logs = logs.clone();

            Box::pin(async move {
                let log = run_execution_poller(&orchestrator).await;
                push_log(&logs, log).await;
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled execution poller to run every {} seconds", interval);
        Ok(())
    }

    async fn schedule_container_sweep(&self) -> JobResult<()> {
        let interval = self.config.container_sweep_interval_minutes;
        let cron_expr = format!("0 */{} * * * *", interval); // Every N minutes

        let orchestrator = self.orchestrator.clone();
        let logs = self.execution_logs.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let orchestrator = orchestrator.clone();
            let logs = logs.clone();

            Box::pin(async move {
                let log = run_container_sweep(&orchestrator).await;
                push_log(&logs, log).await;
            })
        })?;

        self.scheduler.add(job).await?;
        info!(
            "Scheduled container sweep to run every {} minutes",
            interval
        );
        Ok(())
    }
}

async fn run_execution_poller(orchestrator: &Orchestrator) -> JobExecutionLog {
    let started_at = Utc::now();

    match orchestrator.run_due_executions(started_at).await {
        Ok(executed) => {
            if executed > 0 {
                info!("Execution poller ran {} due executions", executed);
            }
            finish_log(EXECUTION_POLLER, started_at, executed as i64, Vec::new())
        }
        Err(e) => {
            error!("Execution poller failed: {}", e);
            finish_log(EXECUTION_POLLER, started_at, 0, vec![e.to_string()])
        }
    }
}

async fn run_container_sweep(orchestrator: &Orchestrator) -> JobExecutionLog {
    let started_at = Utc::now();

    match orchestrator.sweep_stuck_containers(started_at).await {
        Ok(swept) => {
            if swept > 0 {
                info!("Container sweep marked {} stuck containers failed", swept);
            }
            finish_log(CONTAINER_SWEEP, started_at, swept as i64, Vec::new())
        }
        Err(e) => {
            error!("Container sweep failed: {}", e);
            finish_log(CONTAINER_SWEEP, started_at, 0, vec![e.to_string()])
        }
    }
}

fn finish_log(
    job_name: &str,
    started_at: DateTime<Utc>,
    items_processed: i64,
    errors: Vec<String>,
) -> JobExecutionLog {
    let completed_at = Utc::now();

    JobExecutionLog {
        id: Uuid::new_v4(),
        job_name: job_name.to_string(),
        started_at,
        completed_at: Some(completed_at),
        status: if errors.is_empty() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        },
        items_processed,
        errors,
        duration_ms: Some((completed_at - started_at).num_milliseconds()),
    }
}

async fn push_log(logs: &Arc<RwLock<Vec<JobExecutionLog>>>, log: JobExecutionLog) {
    let mut logs = logs.write().await;
    logs.push(log);
    // Keep only last 100 logs
    if logs.len() > 100 {
        logs.remove(0);
    }
}
