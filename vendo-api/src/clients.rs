//! HTTP adapters for the live carrier and payment gateway APIs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use vendo_core::carrier::{
    CarrierAdapter, RateItem, RateParty, RateQuoteResponse, ShipmentReceipt, TrackingReport,
    ValidatedAddress,
};
use vendo_core::payment::{
    GatewaySession, GatewayStatus, GatewayVerification, InitializePaymentRequest, PaymentAdapter,
};
use vendo_core::BoxError;

/// Carrier API client. Every response arrives wrapped in a
/// `{"status": ..., "data": ...}` envelope.
pub struct HttpCarrierClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    status: Option<String>,
    data: T,
}

impl HttpCarrierClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CarrierAdapter for HttpCarrierClient {
    async fn validate_address(&self, party: &RateParty) -> Result<ValidatedAddress, BoxError> {
        let response = self
            .client
            .post(self.url("/shipping/address/validate"))
            .bearer_auth(&self.api_key)
            .json(party)
            .send()
            .await?
            .error_for_status()?;

        let body: Envelope<ValidatedAddress> = response.json().await?;
        Ok(body.data)
    }

    async fn get_delivery_rates(
        &self,
        sender: &RateParty,
        receiver: &RateParty,
        items: &[RateItem],
    ) -> Result<RateQuoteResponse, BoxError> {
        let response = self
            .client
            .post(self.url("/shipping/rates"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "sender": sender,
                "receiver": receiver,
                "items": items,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: Envelope<RateQuoteResponse> = response.json().await?;
        Ok(body.data)
    }

    async fn create_shipment(
        &self,
        request_token: &str,
        courier_id: &str,
        insured: bool,
    ) -> Result<ShipmentReceipt, BoxError> {
        let response = self
            .client
            .post(self.url("/shipping/shipments"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "request_token": request_token,
                "courier_id": courier_id,
                "is_insured": insured,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: Envelope<ShipmentReceipt> = response.json().await?;
        Ok(body.data)
    }

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingReport, BoxError> {
        let response = self
            .client
            .get(self.url(&format!("/shipping/shipments/track/{}", tracking_number)))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let body: Envelope<TrackingReport> = response.json().await?;
        Ok(body.data)
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> Result<(), BoxError> {
        self.client
            .delete(self.url(&format!("/shipping/shipments/{}", tracking_number)))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Payment gateway client (hosted-checkout style API).
pub struct HttpPaymentClient {
    base_url: String,
    secret_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
}

impl HttpPaymentClient {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentAdapter for HttpPaymentClient {
    async fn initialize(
        &self,
        req: &InitializePaymentRequest,
    ) -> Result<GatewaySession, BoxError> {
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(req)
            .send()
            .await?
            .error_for_status()?;

        let body: Envelope<InitializeData> = response.json().await?;
        Ok(GatewaySession {
            authorization_url: body.data.authorization_url,
            access_code: body.data.access_code,
            reference: body.data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, BoxError> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?;

        let raw: serde_json::Value = response.json().await?;
        let data: VerifyData = serde_json::from_value(raw["data"].clone())?;
        let status = match data.status.as_str() {
            "success" => GatewayStatus::Success,
            "failed" => GatewayStatus::Failed,
            "abandoned" => GatewayStatus::Abandoned,
            _ => GatewayStatus::Pending,
        };
        Ok(GatewayVerification { status, raw })
    }
}
