// Secret Store collaborator
//
// Typed contract over per-tenant provider credentials. No confidentiality
// guarantee is assumed here; a production deployment plugs in a real vault
// behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};

/// Credentials for one tenant's account with one channel provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCredentials {
    pub account_id: String,
    pub api_key: String,
    pub from_number: Option<String>,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn store(
        &self,
        tenant_id: Uuid,
        service: &str,
        credentials: ChannelCredentials,
    ) -> ApiResult<()>;

    /// `CredentialsNotFound` when the tenant has nothing stored for the
    /// service.
    async fn retrieve(&self, tenant_id: Uuid, service: &str) -> ApiResult<ChannelCredentials>;

    async fn delete(&self, tenant_id: Uuid, service: &str) -> ApiResult<()>;
}

/// In-memory secret store for tests and local runs.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<(Uuid, String), ChannelCredentials>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn store(
        &self,
        tenant_id: Uuid,
        service: &str,
        credentials: ChannelCredentials,
    ) -> ApiResult<()> {
        self.entries
            .write()
            .await
            .insert((tenant_id, service.to_string()), credentials);
        Ok(())
    }

    async fn retrieve(&self, tenant_id: Uuid, service: &str) -> ApiResult<ChannelCredentials> {
        self.entries
            .read()
            .await
            .get(&(tenant_id, service.to_string()))
            .cloned()
            .ok_or_else(|| AppError::CredentialsNotFound {
                tenant_id,
                service: service.to_string(),
            })
    }

    async fn delete(&self, tenant_id: Uuid, service: &str) -> ApiResult<()> {
        self.entries
            .write()
            .await
            .remove(&(tenant_id, service.to_string()));
        Ok(())
    }
}
