// Channel Senders - outbound SMS and voice gateways
//
// The executor talks to providers through the `ChannelSender` trait; HTTP
// gateway implementations live in `sms.rs` and `voice.rs`. Per-tenant
// provider credentials come from the `SecretStore` collaborator.

pub mod secrets;
pub mod sms;
pub mod voice;

pub use secrets::{ChannelCredentials, MemorySecretStore, SecretStore};
pub use sms::HttpSmsSender;
pub use voice::HttpVoiceSender;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenantflow_shared::Channel;

use crate::error::ApiResult;

/// What a provider returns for an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReceipt {
    pub external_id: String,
    pub status: String,
}

#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    /// Deliver one payload to one recipient. Provider rejections surface as
    /// `ExternalServiceError`; the caller records them, never retries here.
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        to: &str,
        payload: &str,
    ) -> ApiResult<ChannelReceipt>;
}
