use crate::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Success,
    Failed,
    Pending,
    Abandoned,
}

/// Hosted checkout session returned by payment initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayVerification {
    pub status: GatewayStatus,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializePaymentRequest {
    pub email: String,
    /// Minor currency units.
    pub amount: i64,
    /// Unique per order; we key sessions by order number.
    pub reference: String,
    pub callback_url: String,
    pub metadata: serde_json::Value,
}

/// Contract for the hosted payment gateway.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn initialize(&self, req: &InitializePaymentRequest) -> Result<GatewaySession, BoxError>;

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, BoxError>;
}
