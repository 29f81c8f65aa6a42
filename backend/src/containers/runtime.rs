// Container Runtime collaborator
//
// Opaque provisioner for the compute substrate hosting tenant workflows.
// The manager only ever calls create/push/terminate; everything else about
// the substrate is out of scope.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tenantflow_shared::Container;
use tracing::info;

use crate::error::{ApiResult, AppError};

/// Returned by a successful workflow push.
#[derive(Debug, Clone)]
pub struct PushReceipt {
    pub workflow_ref: String,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create(&self, container: &Container) -> ApiResult<()>;
    async fn push(
        &self,
        container: &Container,
        workflow: &serde_json::Value,
    ) -> ApiResult<PushReceipt>;
    async fn terminate(&self, container: &Container) -> ApiResult<()>;
}

/// HTTP provisioner client.
pub struct HttpContainerRuntime {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PushResponse {
    workflow_ref: String,
}

impl HttpContainerRuntime {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn service_error(err: impl std::fmt::Display) -> AppError {
        AppError::ExternalService {
            service: "container-runtime".to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for HttpContainerRuntime {
    async fn create(&self, container: &Container) -> ApiResult<()> {
        let url = format!("{}/v1/containers", self.base_url);
        let body = json!({
            "container_id": container.id,
            "tenant_id": container.tenant_id,
            "region": container.region,
            "cpu_millis": container.resources.cpu_millis,
            "memory_mb": container.resources.memory_mb,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::service_error)?;

        if !response.status().is_success() {
            return Err(Self::service_error(format!(
                "create returned {}",
                response.status()
            )));
        }

        info!("container {} provisioned", container.id);
        Ok(())
    }

    async fn push(
        &self,
        container: &Container,
        workflow: &serde_json::Value,
    ) -> ApiResult<PushReceipt> {
        let url = format!("{}/v1/containers/{}/workflow", self.base_url, container.id);

        let response = self
            .client
            .put(&url)
            .json(workflow)
            .send()
            .await
            .map_err(Self::service_error)?;

        if !response.status().is_success() {
            return Err(Self::service_error(format!(
                "push returned {}",
                response.status()
            )));
        }

        let parsed: PushResponse = response.json().await.map_err(Self::service_error)?;
        Ok(PushReceipt {
            workflow_ref: parsed.workflow_ref,
        })
    }

    async fn terminate(&self, container: &Container) -> ApiResult<()> {
        let url = format!("{}/v1/containers/{}", self.base_url, container.id);

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(Self::service_error)?;

        if !response.status().is_success() {
            return Err(Self::service_error(format!(
                "terminate returned {}",
                response.status()
            )));
        }

        info!("container {} terminated", container.id);
        Ok(())
    }
}
