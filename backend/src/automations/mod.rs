// Automation Rule Engine
//
// Per-tenant event automation: match active rules against an incoming
// trigger event, then execute immediately or park a durable timer row for
// the cron worker. Matching is pure (matcher.rs), durability lives in the
// scheduler (scheduler.rs), side effects in the executor (executor.rs).

pub mod executor;
pub mod matcher;
pub mod scheduler;

pub use executor::ActionExecutor;
pub use scheduler::{ExecutionScheduler, ScheduleOutcome};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tenantflow_shared::{ScheduledExecution, ScheduledStatus, TriggerEvent};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::store::Store;

/// How many due rows one worker pass will claim.
const CLAIM_BATCH: i64 = 100;

/// How long a claimed row may sit in `executing` before it is treated as
/// abandoned by a dead worker and requeued.
const STALE_EXECUTING_MINUTES: i64 = 10;

/// What one delivered event produced across all matched rules.
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub matched_rule_ids: Vec<Uuid>,
    pub scheduled_count: usize,
    pub executed_immediately_count: usize,
}

pub struct AutomationEngine {
    store: Arc<dyn Store>,
    scheduler: ExecutionScheduler,
    executor: Arc<ActionExecutor>,
}

impl AutomationEngine {
    pub fn new(store: Arc<dyn Store>, executor: Arc<ActionExecutor>) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(store.clone()),
            store,
            executor,
        }
    }

    /// Fan one event out over the tenant's active rules. Duplicate
    /// deliveries are absorbed by the scheduler's idempotency key; a rule
    /// whose action fails still counts as executed, with the failure in its
    /// execution record.
    pub async fn handle_event(&self, event: &TriggerEvent) -> ApiResult<EventOutcome> {
        let rules = self.store.active_rules(event.tenant_id).await?;
        let now = Utc::now();

        let mut outcome = EventOutcome {
            matched_rule_ids: Vec::new(),
            scheduled_count: 0,
            executed_immediately_count: 0,
        };

        for rule in rules.iter().filter(|r| matcher::rule_matches(r, event)) {
            outcome.matched_rule_ids.push(rule.id);

            // One rule's failure never blocks its siblings; the failed
            // rule's row stays behind for the poller to pick up.
            match self.scheduler.schedule(rule, event, now).await? {
                ScheduleOutcome::Immediate(row) => match self.complete_claimed(&row).await {
                    Ok(()) => outcome.executed_immediately_count += 1,
                    Err(e) => {
                        error!(rule_id = %rule.id, "immediate execution failed: {}", e);
                    }
                },
                ScheduleOutcome::Scheduled(_) => outcome.scheduled_count += 1,
                ScheduleOutcome::Duplicate => {}
            }
        }

        info!(
            tenant_id = %event.tenant_id,
            lead_id = %event.lead_id,
            "event {:?}: {} matched, {} scheduled, {} immediate",
            event.kind,
            outcome.matched_rule_ids.len(),
            outcome.scheduled_count,
            outcome.executed_immediately_count
        );
        Ok(outcome)
    }

    /// Claim and execute every scheduled row due at `now`. Called by the
    /// cron worker; because rows are claimed atomically, concurrent workers
    /// never double-execute. Rows a dead worker left in `executing` are
    /// requeued first. Returns how many rows ran.
    pub async fn run_due(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        let requeued = self
            .store
            .requeue_stale_executing(now - Duration::minutes(STALE_EXECUTING_MINUTES))
            .await?;
        if requeued > 0 {
            warn!("requeued {} stale executing rows", requeued);
        }

        let due = self.store.claim_due_executions(now, CLAIM_BATCH).await?;
        let mut executed = 0u64;

        for row in due {
            match self.run_claimed(&row).await {
                Ok(true) => executed += 1,
                Ok(false) => {}
                // The row stays `executing` and comes back through the
                // stale requeue on a later pass.
                Err(e) => {
                    error!(scheduled_id = %row.id, "claimed execution failed: {}", e);
                }
            }
        }

        Ok(executed)
    }

    /// Run one claimed row to its terminal status. Returns whether the
    /// action actually ran.
    async fn run_claimed(&self, row: &ScheduledExecution) -> ApiResult<bool> {
        // The rule may have been deleted since scheduling; its rows die
        // with it.
        if self
            .store
            .get_rule(row.tenant_id, row.rule_id)
            .await?
            .is_none()
        {
            warn!(rule_id = %row.rule_id, "rule gone, cancelling claimed execution");
            self.store
                .mark_scheduled(row.id, ScheduledStatus::Cancelled)
                .await?;
            return Ok(false);
        }

        self.complete_claimed(row).await?;
        Ok(true)
    }

    /// Execute the action frozen into the row at scheduling time, then
    /// close the row out.
    async fn complete_claimed(&self, row: &ScheduledExecution) -> ApiResult<()> {
        self.executor
            .execute(row.tenant_id, row.rule_id, row.lead_id, &row.action)
            .await?;
        self.store
            .mark_scheduled(row.id, ScheduledStatus::Completed)
            .await
    }

    /// Drop a rule's pending timers. Rows already claimed are past the
    /// commit point and keep running.
    pub async fn cancel_rule_pending(&self, rule_id: Uuid) -> ApiResult<u64> {
        let cancelled = self.store.cancel_pending_for_rule(rule_id).await?;
        if cancelled > 0 {
            info!(rule_id = %rule_id, "cancelled {} pending executions", cancelled);
        }
        Ok(cancelled)
    }
}
