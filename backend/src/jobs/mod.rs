// Background Jobs
//
// Two periodic workers keep the orchestration core honest after crashes:
// the execution poller drains due scheduled_executions rows, and the
// container sweep fails containers stuck in a transitional state. Jobs are
// scheduled with tokio-cron-scheduler.

pub mod scheduler;

pub use scheduler::{JobConfig, JobError, JobExecutionLog, JobResult, JobScheduler, JobStatus};
