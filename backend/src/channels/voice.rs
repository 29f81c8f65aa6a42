// HTTP voice gateway sender

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tenantflow_shared::Channel;
use tracing::info;

use super::{ChannelCredentials, ChannelReceipt, ChannelSender};
use crate::error::{ApiResult, AppError};

pub struct HttpVoiceSender {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct GatewayResponse {
    id: String,
    status: String,
}

impl HttpVoiceSender {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChannelSender for HttpVoiceSender {
    fn channel(&self) -> Channel {
        Channel::Call
    }

    async fn send(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        payload: &str,
    ) -> ApiResult<ChannelReceipt> {
        let url = format!("{}/v1/calls", self.base_url);
        let body = json!({
            "account_id": credentials.account_id,
            "from": credentials.from_number,
            "to": to,
            "script": payload,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService {
                service: "voice-gateway".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService {
                service: "voice-gateway".to_string(),
                message: format!("gateway returned {}", response.status()),
            });
        }

        let parsed: GatewayResponse =
            response.json().await.map_err(|e| AppError::ExternalService {
                service: "voice-gateway".to_string(),
                message: format!("malformed gateway response: {}", e),
            })?;

        info!("call placed via gateway: {}", parsed.id);
        Ok(ChannelReceipt {
            external_id: parsed.id,
            status: parsed.status,
        })
    }
}
