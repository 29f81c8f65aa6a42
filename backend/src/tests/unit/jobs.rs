// Background job scheduler behavior

use crate::jobs::{JobConfig, JobError, JobScheduler, JobStatus};
use crate::tests::fixtures::Harness;

#[tokio::test]
async fn jobs_run_on_demand_and_the_scheduler_shuts_down_cleanly() {
    let harness = Harness::new();
    let mut scheduler = JobScheduler::new(harness.orchestrator.clone(), JobConfig::default())
        .await
        .unwrap();
    scheduler.start().await.unwrap();

    let log = scheduler.run_job_now("execution_poller").await.unwrap();
    assert_eq!(log.job_name, "execution_poller");
    assert_eq!(log.status, JobStatus::Completed);
    assert_eq!(log.items_processed, 0);

    let log = scheduler.run_job_now("container_sweep").await.unwrap();
    assert_eq!(log.status, JobStatus::Completed);

    assert_eq!(scheduler.recent_logs().await.len(), 2);

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_job_names_are_rejected() {
    let harness = Harness::new();
    let scheduler = JobScheduler::new(harness.orchestrator.clone(), JobConfig::default())
        .await
        .unwrap();

    assert!(matches!(
        scheduler.run_job_now("vacuum_moon").await,
        Err(JobError::UnknownJob(_))
    ));
}
