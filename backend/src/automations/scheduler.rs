// Execution scheduler - durable delayed execution
//
// Delays are durable rows in scheduled_executions, not in-process timers,
// so they survive restarts. The unique key (rule_id, lead_id,
// trigger_event_id) doubles as the duplicate-execution guard: re-delivering
// the same event is a no-op.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tenantflow_shared::{AutomationRule, ScheduledExecution, ScheduledStatus, TriggerEvent};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::store::Store;

pub struct ExecutionScheduler {
    store: Arc<dyn Store>,
}

/// What scheduling one matched rule produced.
pub enum ScheduleOutcome {
    /// Row inserted `pending`; a worker will claim it at `execute_at`.
    Scheduled(ScheduledExecution),
    /// Zero delay: row inserted, caller executes now and marks it completed.
    Immediate(ScheduledExecution),
    /// Idempotency key already present; nothing to do.
    Duplicate,
}

impl ExecutionScheduler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn schedule(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        now: DateTime<Utc>,
    ) -> ApiResult<ScheduleOutcome> {
        let scheduled = ScheduledExecution {
            id: Uuid::new_v4(),
            tenant_id: rule.tenant_id,
            rule_id: rule.id,
            lead_id: event.lead_id,
            trigger_event_id: event.event_id,
            action: rule.action.clone(),
            status: ScheduledStatus::Pending,
            execute_at: now + Duration::minutes(rule.delay_minutes),
            created_at: now,
        };

        match self.store.try_insert_scheduled(&scheduled).await {
            Ok(()) => {}
            Err(AppError::DuplicateExecution) => {
                info!(
                    rule_id = %rule.id,
                    lead_id = %event.lead_id,
                    "duplicate trigger, execution already recorded"
                );
                return Ok(ScheduleOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        if rule.delay_minutes == 0 {
            Ok(ScheduleOutcome::Immediate(scheduled))
        } else {
            info!(
                rule_id = %rule.id,
                lead_id = %event.lead_id,
                "execution scheduled for {}",
                scheduled.execute_at
            );
            Ok(ScheduleOutcome::Scheduled(scheduled))
        }
    }
}
