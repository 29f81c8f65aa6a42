use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS containers (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    status TEXT NOT NULL,
    region TEXT NOT NULL,
    cpu_millis INTEGER NOT NULL,
    memory_mb INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deployed_at TIMESTAMPTZ,
    stopped_at TIMESTAMPTZ,
    workflow JSONB
);
CREATE INDEX IF NOT EXISTS idx_containers_tenant ON containers (tenant_id);

CREATE TABLE IF NOT EXISTS container_events (
    id UUID PRIMARY KEY,
    container_id UUID NOT NULL,
    tenant_id UUID NOT NULL,
    event_type TEXT NOT NULL,
    metadata JSONB NOT NULL,
    at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_container_events_tenant ON container_events (tenant_id, at DESC);

CREATE TABLE IF NOT EXISTS agents (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    template_id UUID,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    configuration JSONB NOT NULL,
    workflow_ref TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agents_tenant ON agents (tenant_id);

CREATE TABLE IF NOT EXISTS templates (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    configuration JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS automation_rules (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    trigger JSONB NOT NULL,
    action JSONB NOT NULL,
    delay_minutes BIGINT NOT NULL,
    is_active BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_automation_rules_tenant ON automation_rules (tenant_id);

CREATE TABLE IF NOT EXISTS scheduled_executions (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    rule_id UUID NOT NULL,
    lead_id UUID NOT NULL,
    trigger_event_id UUID NOT NULL,
    action JSONB NOT NULL,
    status TEXT NOT NULL,
    execute_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    UNIQUE (rule_id, lead_id, trigger_event_id)
);
CREATE INDEX IF NOT EXISTS idx_scheduled_due ON scheduled_executions (status, execute_at);

CREATE TABLE IF NOT EXISTS automation_executions (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    rule_id UUID NOT NULL,
    lead_id UUID NOT NULL,
    action_type TEXT NOT NULL,
    status TEXT NOT NULL,
    details TEXT NOT NULL,
    executed_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_automation_executions_tenant ON automation_executions (tenant_id, executed_at DESC);

CREATE TABLE IF NOT EXISTS deployment_logs (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    agent_id UUID NOT NULL,
    template_id UUID,
    container_id UUID,
    status TEXT NOT NULL,
    deployed_at TIMESTAMPTZ NOT NULL,
    metadata JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_deployment_logs_tenant ON deployment_logs (tenant_id, deployed_at DESC);

CREATE TABLE IF NOT EXISTS leads (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_leads_tenant ON leads (tenant_id);

CREATE TABLE IF NOT EXISTS communications (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL,
    lead_id UUID NOT NULL,
    channel TEXT NOT NULL,
    body TEXT NOT NULL,
    external_id TEXT,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_communications_tenant ON communications (tenant_id, created_at DESC);
"#;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
}

/// Apply the schema. Statements are idempotent so this is safe to run on
/// every startup.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
