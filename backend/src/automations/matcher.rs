// Rule matcher - pure predicate, no IO

use tenantflow_shared::{AutomationRule, Trigger, TriggerEvent, TriggerKind};

/// Whether a rule fires for an event. A rule matches iff it is active,
/// belongs to the event's tenant, the trigger kind equals the event kind
/// and, for kinds that carry a value, the values are equal.
pub fn rule_matches(rule: &AutomationRule, event: &TriggerEvent) -> bool {
    if !rule.is_active || rule.tenant_id != event.tenant_id {
        return false;
    }

    match &rule.trigger {
        Trigger::LeadCreated => event.kind == TriggerKind::LeadCreated,
        Trigger::LeadStatusChanged { value } => {
            event.kind == TriggerKind::LeadStatusChanged
                && event.value.as_deref() == Some(value.as_str())
        }
        // Days are the detector's concern; by the time the event arrives the
        // threshold has already elapsed.
        Trigger::NoResponseAfterDays { .. } => event.kind == TriggerKind::NoResponseAfterDays,
    }
}
